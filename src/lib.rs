use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::state::DialogState;

pub mod builder;
pub mod commands;
pub mod database;
pub mod editor;
pub mod importer;
pub mod keyboard;
pub mod runner;
pub mod schema;
pub mod state;

pub type UserDialogue = Dialogue<DialogState, InMemStorage<DialogState>>;
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;
