//! Scoped temp copies of editor buffers.
//!
//! The analysis server reads sources from disk, so unsaved buffers are written to
//! `<scratch>/<uuid>.$temp$<ext>` before each query. A [`StagedSource`] deletes its file when
//! dropped, which covers early returns and errors as well as panics that unwind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Marker inserted before the extension of every staged file.
pub const TEMP_MARKER: &str = ".$temp$";
/// Prefix of the optional first line pointing back at the original file.
pub const BACK_REFERENCE_PREFIX: &str = "// source:";

/// Creates staged copies inside one scratch directory.
#[derive(Debug, Clone)]
pub struct Stager {
	dir: PathBuf,
}

impl Stager {
	/// Creates a stager writing into `dir`. The directory is created lazily.
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	/// Scratch directory.
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Writes `content` to a fresh staged file named after `original`'s extension.
	///
	/// With `back_reference` set, the first line becomes `// source:<original>`; the shift
	/// this introduces is exposed through [`StagedSource::offset_shift`] and
	/// [`StagedSource::line_shift`].
	pub fn stage(&self, content: &str, original: &Path, back_reference: bool) -> io::Result<StagedSource> {
		fs::create_dir_all(&self.dir)?;
		let ext = original.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
		let path = self.dir.join(format!("{}{TEMP_MARKER}{ext}", Uuid::new_v4()));

		let header = back_reference.then(|| format!("{BACK_REFERENCE_PREFIX}{}\n", original.display()));
		match &header {
			Some(header) => fs::write(&path, format!("{header}{content}"))?,
			None => fs::write(&path, content)?,
		}
		tracing::trace!(staged = %path.display(), original = %original.display(), "Staged source");

		Ok(StagedSource {
			path,
			original: original.to_path_buf(),
			offset_shift: header.as_ref().map_or(0, |h| h.chars().count()),
			line_shift: u32::from(header.is_some()),
		})
	}
}

/// A staged copy of an editor buffer. The file is removed on drop.
#[derive(Debug)]
pub struct StagedSource {
	path: PathBuf,
	original: PathBuf,
	offset_shift: usize,
	line_shift: u32,
}

impl StagedSource {
	/// Path of the staged file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Path of the buffer this copy was made from.
	pub fn original(&self) -> &Path {
		&self.original
	}

	/// Characters prepended before the buffer content.
	pub fn offset_shift(&self) -> usize {
		self.offset_shift
	}

	/// Lines prepended before the buffer content.
	pub fn line_shift(&self) -> u32 {
		self.line_shift
	}

	/// Maps a buffer offset to the matching offset in the staged file.
	pub fn staged_offset(&self, offset: usize) -> usize {
		offset + self.offset_shift
	}

	/// Rewrites every mention of the staged path back to the original path.
	pub fn restore_paths(&self, text: &str) -> String {
		text.replace(&*self.path.to_string_lossy(), &self.original.to_string_lossy())
	}

	/// Maps a zero-based line in the staged file back to the buffer.
	pub fn restore_line(&self, line: u32) -> u32 {
		line.saturating_sub(self.line_shift)
	}

	/// Rewrites a `path(line,col)...` location line that points into the staged file,
	/// restoring the original path and compensating the back-reference line.
	pub fn restore_location(&self, line: &str) -> String {
		let staged = self.path.to_string_lossy();
		let Some(rest) = line.strip_prefix(&*staged) else {
			return line.to_string();
		};
		let original = self.original.to_string_lossy();
		if self.line_shift > 0
			&& let Some(inner) = rest.strip_prefix('(')
			&& let Some((n, tail)) = inner.split_once(',')
			&& let Ok(n) = n.trim().parse::<u32>()
		{
			return format!("{original}({},{tail}", n.saturating_sub(self.line_shift));
		}
		format!("{original}{rest}")
	}

	/// Deletes the staged file now instead of at the end of scope.
	pub fn unstage(self) {}
}

impl Drop for StagedSource {
	fn drop(&mut self) {
		if let Err(e) = fs::remove_file(&self.path)
			&& e.kind() != io::ErrorKind::NotFound
		{
			tracing::debug!(path = %self.path.display(), error = %e, "Failed to remove staged source");
		}
	}
}

/// Removes the staged-file marker from paths embedded in `text`.
pub fn clear_temp_suffixes(text: &str) -> String {
	text.replace(TEMP_MARKER, "")
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn staged_file_lives_for_the_scope() {
		let dir = tempfile::tempdir().unwrap();
		let stager = Stager::new(dir.path().join("scratch"));
		let staged = stager.stage("class A {}", Path::new("/w/script.cs"), false).unwrap();

		let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();
		assert!(name.ends_with(".$temp$.cs"), "{name}");
		assert_eq!(staged.path().parent(), Some(stager.dir()));
		assert_eq!(fs::read_to_string(staged.path()).unwrap(), "class A {}");

		let path = staged.path().to_path_buf();
		drop(staged);
		assert!(!path.exists());
	}

	#[test]
	fn staged_file_is_removed_when_the_query_fails() {
		fn query(stager: &Stager, seen: &mut Option<PathBuf>) -> io::Result<()> {
			let staged = stager.stage("x", Path::new("a.cs"), false)?;
			*seen = Some(staged.path().to_path_buf());
			Err(io::Error::other("server went away"))
		}

		let dir = tempfile::tempdir().unwrap();
		let stager = Stager::new(dir.path());
		let mut seen = None;
		assert!(query(&stager, &mut seen).is_err());
		assert!(!seen.unwrap().exists());
	}

	#[test]
	fn staged_file_is_removed_on_panic() {
		let dir = tempfile::tempdir().unwrap();
		let stager = Stager::new(dir.path());
		let seen = std::sync::Mutex::new(None);
		let result = std::panic::catch_unwind(|| {
			let staged = stager.stage("x", Path::new("a.cs"), false).unwrap();
			*seen.lock().unwrap() = Some(staged.path().to_path_buf());
			panic!("handler failed");
		});
		assert!(result.is_err());
		assert!(!seen.into_inner().unwrap().unwrap().exists());
	}

	#[test]
	fn explicit_unstage_and_repeat_cleanup() {
		let dir = tempfile::tempdir().unwrap();
		let staged = Stager::new(dir.path()).stage("x", Path::new("a.cs"), false).unwrap();
		let path = staged.path().to_path_buf();
		fs::remove_file(&path).unwrap();
		staged.unstage();
		assert!(!path.exists());
	}

	#[test]
	fn back_reference_shifts_positions() {
		let dir = tempfile::tempdir().unwrap();
		let original = Path::new("/w/a.cs");
		let staged = Stager::new(dir.path()).stage("int x;", original, true).unwrap();

		let written = fs::read_to_string(staged.path()).unwrap();
		assert_eq!(written, "// source:/w/a.cs\nint x;");
		assert_eq!(staged.staged_offset(4), 4 + "// source:/w/a.cs\n".len());
		assert_eq!(staged.restore_line(5), 4);

		let loc = format!("{}(6,3): int x;", staged.path().display());
		assert_eq!(staged.restore_location(&loc), "/w/a.cs(5,3): int x;");
		assert_eq!(staged.restore_location("/w/b.cs(6,3): y"), "/w/b.cs(6,3): y");
	}

	#[test]
	fn paths_are_restored_in_payloads() {
		let dir = tempfile::tempdir().unwrap();
		let staged = Stager::new(dir.path()).stage("", Path::new("/w/a.cs"), false).unwrap();
		let text = format!("file:{}\nline:2", staged.path().display());
		assert_eq!(staged.restore_paths(&text), "file:/w/a.cs\nline:2");
		let loc = format!("{}(2,1): x", staged.path().display());
		assert_eq!(staged.restore_location(&loc), "/w/a.cs(2,1): x");
		assert_eq!(clear_temp_suffixes("/t/a.$temp$.cs(1,1)"), "/t/a.cs(1,1)");
	}
}
