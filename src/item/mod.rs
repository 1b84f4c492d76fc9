/// This module provides the CSV table reader and writer.
pub mod csv;

/// This module provides the line-oriented record parser for raw collection files.
pub mod record;
