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

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::Malformed {
            message: "Read would have gone out of bounds".to_string(),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering every failure this library can return.
///
/// Identity resolution has exactly three observable failure kinds, and any
/// internal inconsistency - a bad offset, an invalid heap handle, a goblin
/// parse failure - is re-signaled as [`Error::Malformed`] rather than leaking
/// a lower-level error type to the caller.
///
/// # Examples
///
/// ```rust,no_run
/// use dotident::{AssemblyIdentity, Error};
/// use std::path::Path;
///
/// match AssemblyIdentity::from_file(Path::new("assembly.dll")) {
///     Ok(identity) => println!("{}", identity),
///     Err(Error::NotFound(io_err)) => eprintln!("cannot open: {}", io_err),
///     Err(Error::Empty) => eprintln!("file is empty"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed image: {} ({}:{})", message, file, line);
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The path does not resolve to a readable file, or the mapping failed.
    ///
    /// Wraps the underlying [`std::io::Error`] from opening or memory-mapping
    /// the image.
    #[error("{0}")]
    NotFound(#[from] std::io::Error),

    /// Provided image was empty.
    ///
    /// A zero-length file cannot contain any header; this is reported before
    /// any structural parsing so it never surfaces as [`Error::Malformed`].
    #[error("Provided image was empty")]
    Empty,

    /// The image is damaged and could not be parsed.
    ///
    /// Covers every structural violation: bad magic values, offsets or sizes
    /// outside the file, invalid heap handles, and a missing Assembly row.
    /// The error records the source location where the malformation was
    /// detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
