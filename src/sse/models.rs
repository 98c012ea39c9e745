/// Something that changes what a results page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    VoteCast {
        question_id: i64,
        choice_id: i64,
        votes: i32,
    },
    QuestionChanged(i64),
    QuestionDeleted(i64),
}

impl PollEvent {
    pub fn question_id(&self) -> i64 {
        match self {
            PollEvent::VoteCast { question_id, .. } => *question_id,
            PollEvent::QuestionChanged(id) | PollEvent::QuestionDeleted(id) => *id,
        }
    }
}

pub type EventSender = tokio::sync::broadcast::Sender<PollEvent>;
