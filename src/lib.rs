// Library surface for the session driver and its tests.
// The binary in main.rs only adds argument parsing, logging setup and the
// WebDriver connection on top of this.
pub mod app_dirs;
pub mod page;
pub mod profile;
pub mod session;
pub mod timing;
pub mod typist;
pub mod webdriver;

pub use page::{InteractivePage, PageElement, PageError};
pub use profile::{Profile, ProfileError, ProfileStore, Selector};
pub use session::{run_session, Session, SessionError, Stage, StagePauses};
pub use timing::{BudgetError, TypingBudget};
pub use typist::{TypingSummary, TypistError};
