pub mod bet;
pub mod event;
pub mod league;
pub mod ranking;

pub use bet::*;
pub use event::*;
pub use league::*;
pub use ranking::*;
