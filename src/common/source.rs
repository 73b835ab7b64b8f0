use std::{
    path::{
        Path,
        PathBuf,
    },
    rc::Rc,
};

/// `Source` is the text a function was compiled from, kept around
/// so that faults can point back into it.
/// It's a string with a path, the path serving as the source's name.
/// Sources without a path are named `./source`.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub contents: String,
    pub path:     PathBuf,
}

impl Source {
    /// Pairs some text with a path.
    /// The path only names the source, nothing is read from it.
    pub fn new(source: &str, path: &Path) -> Rc<Source> {
        Rc::new(Source {
            contents: source.to_string(),
            path:     path.to_owned(),
        })
    }

    /// A `Source` holding just a string.
    pub fn source(source: &str) -> Rc<Source> { Source::new(source, &PathBuf::from("./source")) }

    /// Length of the contents in bytes.
    pub fn len(&self) -> usize { self.contents.len() }

    pub fn is_empty(&self) -> bool { self.contents.is_empty() }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::span::Span;

    #[test]
    fn sources_are_named_by_path() {
        let named = Source::new("(print 1)", Path::new("lib/boot.dst"));
        assert_eq!(Span::new(&named, 1, 5).path(), "lib/boot.dst");
        assert_eq!(named.len(), 9);

        let anonymous = Source::source("");
        assert_eq!(anonymous.path, PathBuf::from("./source"));
        assert!(anonymous.is_empty());
    }
}
