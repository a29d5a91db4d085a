use std::error::Error;

use teloxide::{
    dispatching::{
        dialogue::{self, InMemStorage},
        DpHandlerDescription, UpdateFilterExt, UpdateHandler,
    },
    dptree::{self, Handler},
    prelude::DependencyMap,
    types::Update,
};
use tracing::instrument;

use crate::{
    builder,
    commands::{cancel, help, list, start, stats, Command},
    database::store::JsonStorage,
    editor, runner,
    state::DialogState,
};

pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(help))
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Cancel].endpoint(cancel))
        .branch(case![Command::Play].endpoint(runner::play::<JsonStorage>))
        .branch(case![Command::Stats].endpoint(stats::<JsonStorage>))
        .branch(case![Command::List].endpoint(list::<JsonStorage>))
        .branch(case![Command::Add].endpoint(builder::add_entry))
        .branch(case![Command::Clone(link)].endpoint(builder::clone_entry))
        .branch(case![Command::Edit(arg)].endpoint(editor::edit_entry::<JsonStorage>))
        .branch(case![Command::Remove(arg)].endpoint(editor::remove_entry::<JsonStorage>));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(builder_scheme())
        .branch(editor_scheme())
        .endpoint(builder::fallback);

    let dialogue_handler = dialogue::enter::<Update, InMemStorage<DialogState>, DialogState, _>()
        .branch(message_handler)
        .branch(callback_query_scheme());

    // Poll answers carry no chat, so they are routed outside the dialogue.
    dptree::entry()
        .branch(
            Update::filter_poll_answer().endpoint(runner::handle_poll_answer::<JsonStorage>),
        )
        .branch(dialogue_handler)
}

#[instrument(level = "debug")]
fn builder_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<(dyn Error + Send + Sync + 'static)>>,
    DpHandlerDescription,
> {
    use dptree::case;
    log::debug!("Building a dispatch tree for the question builder");
    Update::filter_message()
        .branch(case![DialogState::ReceiveCloneUrl].endpoint(builder::receive_clone_url))
        .branch(case![DialogState::ReceiveQuestion { source_url }].endpoint(builder::receive_question))
        .branch(
            case![DialogState::ReceiveOptions {
                question,
                source_url
            }]
            .endpoint(builder::receive_options),
        )
}

#[instrument(level = "debug")]
fn editor_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<(dyn Error + Send + Sync + 'static)>>,
    DpHandlerDescription,
> {
    use dptree::case;
    log::debug!("Building a dispatch tree for the editor");
    Update::filter_message()
        .branch(
            case![DialogState::ReceiveEditedText { question_id }]
                .endpoint(editor::receive_edited_text::<JsonStorage>),
        )
        .branch(
            case![DialogState::ReceiveEditedOptions { question_id }]
                .endpoint(editor::receive_edited_options::<JsonStorage>),
        )
}

#[instrument(level = "debug")]
fn callback_query_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<(dyn Error + Send + Sync + 'static)>>,
    DpHandlerDescription,
> {
    use dptree::case;
    log::debug!("Building a dispatch tree for callback queries");
    Update::filter_callback_query()
        .branch(
            case![DialogState::ReceiveAnswer { draft }]
                .endpoint(builder::receive_answer::<JsonStorage>),
        )
        .endpoint(editor::handle_callback::<JsonStorage>)
}
