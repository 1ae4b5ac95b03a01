mod event_form;
mod ledger_entry;
mod mentor;
mod registration;

pub use event_form::*;
pub use ledger_entry::*;
pub use mentor::*;
pub use registration::*;
