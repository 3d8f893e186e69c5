pub mod app;
pub mod autosave;
pub mod bus;
pub mod error;
pub mod logging;
pub mod menu;
pub mod notes;
pub mod shortcuts;
pub mod state;
pub mod status;
pub mod store;
pub mod visibility;
pub mod window;
