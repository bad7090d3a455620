//! Registry trait for implementations selected by name from configuration.

/// Ties a pluggable implementation to its configuration key.
///
/// Each implementation module exposes a `Registry` struct implementing this
/// trait, so the builder can map `[backend.implementations.<NAME>]` to the
/// factory that constructs it.
pub trait ImplementationRegistry {
	/// Key of the implementation's table in the configuration, e.g. "http".
	const NAME: &'static str;

	/// Factory signature shared by all implementations of one interface.
	type Factory;

	/// Returns the factory constructing this implementation.
	fn factory() -> Self::Factory;
}
