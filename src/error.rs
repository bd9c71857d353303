use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! integration_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::HostIntegration {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::HostIntegration {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only conditions that make it impossible to produce a consistent compilation unit are
/// reported through this type. Recoverable conditions (out-of-range configuration values,
/// unsupported value types, deduplication collapses) are recorded as events in the
/// [`EventLog`](crate::compiler::EventLog) of the unit and never abort processing.
///
/// # Error Categories
///
/// ## Fatal for a compilation unit
/// - [`Error::HostIntegration`] - A generated artifact could not be committed to the module
/// - [`Error::Malformed`] - The module is internally inconsistent (payload/type mismatch,
///   dangling references)
///
/// ## Evaluation
/// - [`Error::Evaluation`] - The IR evaluator hit an invalid program state
///
/// # Examples
///
/// ```rust,no_run
/// use obscura::{Error, FlagSet, ObfuscationEngine, ir::Module};
///
/// let mut module = Module::new("unit.c");
/// let engine = ObfuscationEngine::default();
///
/// match engine.process_unit(&mut module, &FlagSet::new()) {
///     Ok(result) => println!("{}", result.summary()),
///     Err(Error::HostIntegration { message, .. }) => eprintln!("aborted: {message}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A generated artifact could not be applied to the host representation.
    ///
    /// This happens when the declaration an artifact targets is no longer present,
    /// lost its initializer, or changed size between encryption and rewriting.
    /// Processing of the affected compilation unit is aborted and the unit is left
    /// untouched.
    ///
    /// # Fields
    ///
    /// * `message` - Description of what could not be applied
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Host integration failed - {file}:{line}: {message}")]
    HostIntegration {
        /// The message to be printed for the HostIntegration error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The module is internally inconsistent.
    ///
    /// Raised when a declaration's initializer size does not match its declared type,
    /// or an instruction references a variable, local or global that does not exist.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The IR evaluator reached an invalid state.
    ///
    /// Covers reads of undefined variables, operand type mismatches, out-of-bounds
    /// element reads and calls to functions that do not exist.
    #[error("Evaluation failed - {0}")]
    Evaluation(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
