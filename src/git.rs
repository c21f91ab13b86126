//! Git access: diffs, commit history, and repository identity.

pub mod commit;
pub mod diff_split;
pub mod history;
pub mod repository;

pub use commit::CommitInfo;
pub use history::GitHistorySource;
pub use repository::GitRepository;
