//! Restart-safe persistence of permanent filter entries
//!
//! The on-disk format is a replayable script of configuration commands,
//! not a structured record format: one line setting the mode flag
//! (`set filterban <0|1>`) followed by one `sv addip <mask>` line per
//! permanent entry. Temporary bans intentionally do not survive a
//! restart. The file is fully overwritten on each save.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::engine::{FilterEngine, FilterMode};
use crate::error::Result;
use crate::store::FilterEntry;

const MODE_DIRECTIVE: &str = "set filterban";
const ADD_DIRECTIVE: &str = "sv addip";

/// Write the mode flag and every permanent entry to `path`, truncating
/// any previous contents. Partial output on write failure is acceptable;
/// the error is reported, never fatal.
pub fn save<'a, P, I>(path: P, mode: FilterMode, entries: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a FilterEntry>,
{
    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{} {}", MODE_DIRECTIVE, mode.as_flag())?;

    let mut written = 0usize;
    for entry in entries {
        if !entry.is_permanent() {
            continue;
        }
        writeln!(writer, "{} {}", ADD_DIRECTIVE, entry.mask)?;
        written += 1;
    }

    writer.flush()?;
    info!(path = %path.as_ref().display(), entries = written, "wrote filter list");
    Ok(())
}

/// Replay a saved filter list into `engine` through the same add path
/// used for live administration. Returns the number of entries applied.
///
/// Blank lines and `#` comments are skipped; an unrecognized directive
/// is logged and skipped so a hand-edited file cannot brick startup.
/// A malformed address inside a known directive is still an error.
pub fn load<P: AsRef<Path>>(
    path: P,
    engine: &mut FilterEngine,
    now: DateTime<Utc>,
) -> Result<usize> {
    let file = File::open(&path)?;
    let reader = BufReader::new(file);

    let mut applied = 0usize;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(flag) = line.strip_prefix(MODE_DIRECTIVE) {
            match flag.trim().parse::<u8>().ok().and_then(FilterMode::from_flag) {
                Some(mode) => engine.set_mode(mode),
                None => warn!(line, "ignoring bad filterban flag"),
            }
        } else if let Some(mask) = line.strip_prefix(ADD_DIRECTIVE) {
            engine.add(mask.trim(), 0, now)?;
            applied += 1;
        } else {
            warn!(line, "ignoring unrecognized directive");
        }
    }

    info!(path = %path.as_ref().display(), applied, "loaded filter list");
    Ok(applied)
}
