// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use core::fmt;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{info, warn};

/// Resolves a playlist location to a local path. `file://` prefixes are
/// stripped; `http://` locations are unsupported and rejected.
pub fn resolve_url(url: &str) -> Result<PathBuf, Box<dyn Error>> {
    if let Some(stripped) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(stripped));
    }
    if url.starts_with("http://") {
        return Err(format!("network playlist retrieval is not supported: {}", url).into());
    }
    Ok(PathBuf::from(url))
}

/// Resolves a playlist location, interpreting relative paths against the
/// media directory.
pub fn resolve_in(url: &str, media_dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let path = resolve_url(url)?;
    Ok(if path.is_absolute() {
        path
    } else {
        media_dir.join(path)
    })
}

/// Reads the playlist source and writes the normalized local-only cache file
/// used for playback thereafter. Blank lines and `#` comments are skipped;
/// `file://` prefixes are stripped; `http://` entries cannot be cached and
/// are dropped with a diagnostic. Returns the number of cached entries.
pub fn cache(source: &Path, cache_path: &Path) -> Result<usize, Box<dyn Error>> {
    let contents = fs::read_to_string(source)
        .map_err(|e| format!("unable to read playlist {}: {}", source.display(), e))?;

    let mut entries: Vec<&str> = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(stripped) = line.strip_prefix("file://") {
            entries.push(stripped);
        } else if line.starts_with("http://") {
            warn!(entry = line, "Cannot cache remote playlist entry, dropping.");
        } else {
            entries.push(line);
        }
    }

    let mut normalized = entries.join("\n");
    if !normalized.is_empty() {
        normalized.push('\n');
    }
    fs::write(cache_path, normalized)
        .map_err(|e| format!("unable to write cache {}: {}", cache_path.display(), e))?;

    info!(
        titles = entries.len(),
        cache = format!("{}", cache_path.display()),
        "Cached playlist."
    );
    Ok(entries.len())
}

/// The cached playlist: an ordered list of local file names, immutable for
/// the session once built.
pub struct Playlist {
    entries: Vec<String>,
}

impl Playlist {
    /// An empty playlist, used while stopped.
    pub fn empty() -> Playlist {
        Playlist {
            entries: Vec::new(),
        }
    }

    /// Loads the playlist from a previously written cache file.
    pub fn load(cache_path: &Path) -> Result<Playlist, Box<dyn Error>> {
        let contents = fs::read_to_string(cache_path)
            .map_err(|e| format!("unable to read cache {}: {}", cache_path.display(), e))?;

        Ok(Playlist {
            entries: contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| line.to_string())
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The file name at the given playlist index.
    pub fn entry(&self, index: usize) -> &str {
        &self.entries[index]
    }
}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Playlist ({} titles):", self.entries.len())?;
        for entry in self.entries.iter() {
            writeln!(f, "  - {}", entry)?;
        }

        Ok(())
    }
}

/// The order titles play in: a permutation over the playlist indices with a
/// cursor. The playlist is circular; exhausting the list rebuilds the order
/// rather than stopping.
pub struct PlayOrder {
    order: Vec<usize>,
    cursor: usize,
    shuffled: bool,
}

impl PlayOrder {
    /// Creates an in-order play order over a playlist of the given length.
    pub fn new(len: usize) -> PlayOrder {
        PlayOrder {
            order: (0..len).collect(),
            cursor: 0,
            shuffled: false,
        }
    }

    /// Returns the next playlist index to play and advances the cursor. The
    /// order is rebuilt first if the shuffle flag changed or the cursor ran
    /// off the end of the list; a running track is never reordered.
    pub fn advance<R: Rng>(&mut self, shuffle: bool, rng: &mut R) -> usize {
        if shuffle != self.shuffled || self.cursor >= self.order.len() {
            self.rebuild(shuffle, rng);
        }

        let index = self.order[self.cursor];
        self.cursor += 1;
        index
    }

    /// Rebuilds the permutation. Fisher-Yates: walk the index down from the
    /// last position, swapping with a uniformly drawn earlier (or equal)
    /// position. Unbiased, linear time.
    fn rebuild<R: Rng>(&mut self, shuffle: bool, rng: &mut R) {
        let len = self.order.len();
        self.order = (0..len).collect();
        if shuffle {
            for i in (1..len).rev() {
                let j = rng.gen_range(0..=i);
                self.order.swap(i, j);
            }
        }

        self.shuffled = shuffle;
        self.cursor = 0;
        info!(shuffled = shuffle, "Rebuilt play order.");
    }

    /// The current permutation.
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{cache, resolve_url, PlayOrder, Playlist};

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            std::path::PathBuf::from("playlist.txt"),
            resolve_url("file://playlist.txt").expect("file url should resolve")
        );
        assert_eq!(
            std::path::PathBuf::from("playlist.txt"),
            resolve_url("playlist.txt").expect("bare name should resolve")
        );
        assert!(resolve_url("http://example.com/playlist.txt").is_err());
    }

    #[test]
    fn test_cache_normalizes_entries() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let source = dir.path().join("playlist.txt");
        let cached = dir.path().join("playlist.cache");

        let mut file = std::fs::File::create(&source).expect("unable to create source");
        write!(
            file,
            "# the bell repertoire\n\nfile://carol.mid\nhttp://example.com/remote.mid\nhymn.mid\n"
        )
        .expect("unable to write source");

        let titles = cache(&source, &cached).expect("cache should succeed");
        assert_eq!(2, titles);

        let playlist = Playlist::load(&cached).expect("cache should load");
        assert_eq!(2, playlist.len());
        assert_eq!("carol.mid", playlist.entry(0));
        assert_eq!("hymn.mid", playlist.entry(1));
    }

    #[test]
    fn test_missing_source() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        assert!(cache(&dir.path().join("absent.txt"), &dir.path().join("c")).is_err());
    }

    fn assert_permutation(order: &[usize], len: usize) {
        let mut seen = vec![false; len];
        for index in order {
            assert!(!seen[*index], "index {} repeated in order", index);
            seen[*index] = true;
        }
        assert!(seen.iter().all(|s| *s), "order is not a full permutation");
    }

    #[test]
    fn test_order_is_always_a_permutation() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut order = PlayOrder::new(11);

        // Toggle shuffle on and off across several full passes of the list;
        // the order must be a bijection after every rebuild.
        for toggle in 0..6 {
            let shuffle = toggle % 2 == 0;
            for _ in 0..11 {
                let index = order.advance(shuffle, &mut rng);
                assert!(index < 11);
            }
            assert_permutation(order.order(), 11);
        }
    }

    #[test]
    fn test_list_is_circular() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut order = PlayOrder::new(3);

        // Unshuffled playback just wraps around in order.
        let first_pass: Vec<usize> = (0..3).map(|_| order.advance(false, &mut rng)).collect();
        let second_pass: Vec<usize> = (0..3).map(|_| order.advance(false, &mut rng)).collect();
        assert_eq!(vec![0, 1, 2], first_pass);
        assert_eq!(vec![0, 1, 2], second_pass);
    }

    #[test]
    fn test_shuffle_applies_on_rebuild_only() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut order = PlayOrder::new(8);

        order.advance(false, &mut rng);
        let before = order.order().to_vec();

        // Passing the flag mid-list rebuilds immediately on the next
        // advance, since the flag differs from the order's tag.
        order.advance(true, &mut rng);
        assert_ne!(before, order.order().to_vec());
        assert_permutation(order.order(), 8);
    }
}
