pub mod clock;
pub mod comparison_service;
pub mod constants;
pub mod error;
pub mod glicko;
pub mod identity;
pub mod ledger;
pub mod locks;
pub mod parameters;
pub mod passive;
pub mod rating_tracker;
pub mod replay;
pub mod structures;
