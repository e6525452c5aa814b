use crate::error::{IndexerError, Result};
use crate::locator::{FileHandle, Locator};
use crate::participant::{ParseHandle, TreeParser};
use crate::problems::{Problem, ProblemCategory, ProblemStore};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Everything a participant may read about one file, plus its problem sink.
pub trait BuildContext {
    fn locator(&self) -> &Locator;

    fn contents(&self) -> Result<Arc<str>>;

    /// Parsed tree for the file, or `None` when no parser applies or parsing failed.
    fn parsed_tree(&self) -> Option<ParseHandle>;

    fn put_problems(&self, category: ProblemCategory, problems: Vec<Problem>);

    fn remove_problems(&self, category: ProblemCategory);
}

/// Build context over a [`FileHandle`]; contents and tree are computed once.
pub struct FileBuildContext {
    file: FileHandle,
    parser: Option<Arc<dyn TreeParser>>,
    problems: Arc<ProblemStore>,
    contents: OnceCell<Arc<str>>,
    tree: OnceCell<Option<ParseHandle>>,
}

impl FileBuildContext {
    pub fn new(
        file: FileHandle,
        parser: Option<Arc<dyn TreeParser>>,
        problems: Arc<ProblemStore>,
    ) -> Self {
        Self {
            file,
            parser,
            problems,
            contents: OnceCell::new(),
            tree: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn file(&self) -> &FileHandle {
        &self.file
    }
}

impl BuildContext for FileBuildContext {
    fn locator(&self) -> &Locator {
        self.file.locator()
    }

    fn contents(&self) -> Result<Arc<str>> {
        self.contents
            .get_or_try_init(|| self.file.read_contents().map_err(IndexerError::from))
            .cloned()
    }

    fn parsed_tree(&self) -> Option<ParseHandle> {
        self.tree
            .get_or_init(|| {
                let parser = self.parser.as_ref()?;
                let text = match self.contents() {
                    Ok(text) => text,
                    Err(err) => {
                        log::warn!("Cannot read {}: {err}", self.locator());
                        return None;
                    }
                };
                match parser.parse(self.locator(), &text) {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        log::debug!("No parsed tree for {}: {err}", self.locator());
                        None
                    }
                }
            })
            .clone()
    }

    fn put_problems(&self, category: ProblemCategory, problems: Vec<Problem>) {
        self.problems.put(self.locator(), category, problems);
    }

    fn remove_problems(&self, category: ProblemCategory) {
        self.problems.remove(self.locator(), category);
    }
}
