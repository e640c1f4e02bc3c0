/// Utility enum that covers all possible errors while assembling dispatcher resources
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `build` was invoked before any `DispatcherArgs` were attached.
    #[error("no dispatcher args attached to the builder")]
    MissingArgs,
}
