// files.rs — raw file access for asset loaders
// Converted from: qcommon/files.c (loose-file subset)

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use crate::common::com_dprintf;

/// Source of whole-file reads. Loaders only ever need "give me all the bytes
/// of this game path".
pub trait FileLoader {
    /// Loads a file into memory. Returns `None` if not found or unreadable.
    fn load_file(&mut self, path: &str) -> Option<Vec<u8>>;
}

/// Directory-backed file system. Later game directories take priority.
#[derive(Default)]
pub struct FsContext {
    /// The search path list. Earlier entries have higher priority.
    pub search_paths: Vec<PathBuf>,
}

impl FsContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a game directory in front of the search path.
    pub fn add_game_directory(&mut self, dir: &str) {
        self.search_paths.insert(0, PathBuf::from(dir));
    }

    /// Game paths are relative and must not climb out of the search dirs.
    fn valid_game_path(path: &str) -> bool {
        !path.is_empty()
            && !path.starts_with('/')
            && !path.starts_with('\\')
            && !path.contains("..")
            && !path.contains(':')
    }

    fn read_whole(path: &PathBuf) -> io::Result<Vec<u8>> {
        let mut f = File::open(path)?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl FileLoader for FsContext {
    fn load_file(&mut self, path: &str) -> Option<Vec<u8>> {
        if !Self::valid_game_path(path) {
            com_dprintf(&format!("FS_LoadFile: refusing path '{}'\n", path));
            return None;
        }

        for dir in &self.search_paths {
            let full = dir.join(path);
            if !full.is_file() {
                continue;
            }
            match Self::read_whole(&full) {
                Ok(buf) => return Some(buf),
                Err(e) => {
                    com_dprintf(&format!("FS_LoadFile: read error on {}: {}\n", full.display(), e));
                    return None;
                }
            }
        }

        com_dprintf(&format!("FS_LoadFile: can't find {}\n", path));
        None
    }
}
