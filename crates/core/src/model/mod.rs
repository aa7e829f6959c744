mod answer;
mod bank;
mod ids;
mod order;
mod question;
mod session;

pub use answer::AnswerRecord;
pub use bank::QuestionBank;
pub use ids::SubjectId;
pub use order::SessionOrder;
pub use question::{AnswerOption, Question};
pub use session::{QuizSession, SessionError, SessionSnapshot};
