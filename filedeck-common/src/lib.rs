pub mod backend;
pub mod facts;
pub mod naming;
pub mod preview;
pub mod record;
