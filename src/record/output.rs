use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use chrono::{DateTime, TimeZone};

use super::scheduler::SegmentOpener;
use super::ts::TsWriter;

pub const SEGMENT_EXTENSION: &str = "ts";

/// Base name shared by every segment of one run.
pub fn run_base_id<Tz: TimeZone>(started: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    started.format("%Y%m%d%H%M%S").to_string()
}

/// `<base>_<index>.ts` when rotating, `<base>.ts` otherwise.
pub fn segment_file_name(base: &str, index: u32, rotating: bool) -> String {
    if rotating {
        format!("{base}_{index}.{SEGMENT_EXTENSION}")
    } else {
        format!("{base}.{SEGMENT_EXTENSION}")
    }
}

/// Opens one MPEG-TS file per segment under a directory.
#[derive(Debug, Clone)]
pub struct FileSegmentOpener {
    dir: PathBuf,
    base: String,
    rotating: bool,
}

impl FileSegmentOpener {
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>, rotating: bool) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
            rotating,
        }
    }

    pub fn path_for(&self, index: u32) -> PathBuf {
        self.dir
            .join(segment_file_name(&self.base, index, self.rotating))
    }
}

impl SegmentOpener for FileSegmentOpener {
    type Writer = TsWriter<BufWriter<File>>;

    fn open(&mut self, index: u32) -> io::Result<Self::Writer> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(index);
        let file = File::create(&path)?;
        tracing::debug!(path = %path.display(), "created segment file");
        TsWriter::new(BufWriter::new(file))
    }
}
