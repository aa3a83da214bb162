use std::path::{Path, PathBuf};

/// `<dir>/<stem>_sources.png` next to the input. A trailing `.gz` is
/// dropped before the stem is taken.
pub fn sources_output_path(input: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = file_name.strip_suffix(".gz").unwrap_or(&file_name);

    let stem = Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{stem}_sources.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_next_to_input() {
        assert_eq!(
            sources_output_path(Path::new("/data/night1/m42.fits")),
            PathBuf::from("/data/night1/m42_sources.png")
        );
    }

    #[test]
    fn test_relative_and_bare_names() {
        assert_eq!(
            sources_output_path(Path::new("frame.fit")),
            PathBuf::from("frame_sources.png")
        );
        assert_eq!(
            sources_output_path(Path::new("obs/frame")),
            PathBuf::from("obs/frame_sources.png")
        );
    }

    #[test]
    fn test_compressed_and_dotted_names() {
        assert_eq!(
            sources_output_path(Path::new("raw/ngc891.fits.gz")),
            PathBuf::from("raw/ngc891_sources.png")
        );
        assert_eq!(
            sources_output_path(Path::new("raw/a.b.fits")),
            PathBuf::from("raw/a.b_sources.png")
        );
    }
}
