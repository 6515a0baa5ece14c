use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Decorative fact sources. Each maps to one fixed public endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    Cat,
    Advice,
    Chuck,
    Dog,
    Affirmation,
    Kanye,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid fact type: {0}")]
pub struct UnknownFactKind(pub String);

impl FactKind {
    pub const ALL: [FactKind; 6] = [
        FactKind::Cat,
        FactKind::Advice,
        FactKind::Chuck,
        FactKind::Dog,
        FactKind::Affirmation,
        FactKind::Kanye,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FactKind::Cat => "cat",
            FactKind::Advice => "advice",
            FactKind::Chuck => "chuck",
            FactKind::Dog => "dog",
            FactKind::Affirmation => "affirmation",
            FactKind::Kanye => "kanye",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            FactKind::Cat => "https://catfact.ninja/fact",
            FactKind::Advice => "https://api.adviceslip.com/advice",
            FactKind::Chuck => "https://api.chucknorris.io/jokes/random",
            FactKind::Dog => "https://dog.ceo/api/breeds/image/random",
            FactKind::Affirmation => "https://www.affirmations.dev/",
            FactKind::Kanye => "https://api.kanye.rest/",
        }
    }

    /// JSON pointer to the string field carrying the fact.
    pub fn pointer(self) -> &'static str {
        match self {
            FactKind::Cat => "/fact",
            FactKind::Advice => "/slip/advice",
            FactKind::Chuck => "/value",
            FactKind::Dog => "/message",
            FactKind::Affirmation => "/affirmation",
            FactKind::Kanye => "/quote",
        }
    }

    pub fn extract(self, body: &serde_json::Value) -> Option<String> {
        body.pointer(self.pointer())
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactKind {
    type Err = UnknownFactKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownFactKind(s.to_string()))
    }
}
