/// An unsaved question: everything collected so far except the correct-answer
/// index. Create, clone and poll-conversion all finish by pairing a draft
/// with a selected index.
#[derive(Debug, Clone)]
pub struct Draft {
    pub question: String,
    pub options: Vec<String>,
    pub category: String,
    pub source_url: Option<String>,
}

/// Per-chat conversation state. Scratch data travels inside the variants, so
/// a finished or cancelled dialogue leaves nothing behind.
#[derive(Debug, Clone, Default)]
pub enum DialogState {
    #[default]
    Idle,

    // PART FOR --- CREATING AND CLONING ---
    ReceiveCloneUrl,
    ReceiveQuestion {
        source_url: Option<String>,
    },
    ReceiveOptions {
        question: String,
        source_url: Option<String>,
    },
    ReceiveAnswer {
        draft: Draft,
    },

    // PART FOR --- EDITING ---
    ReceiveEditedText {
        question_id: u32,
    },
    ReceiveEditedOptions {
        question_id: u32,
    },
}
