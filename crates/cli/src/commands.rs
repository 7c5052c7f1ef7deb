/// Local commit message validation
pub mod check_commit;
/// Repository maintenance sweeps
pub mod maintain;
