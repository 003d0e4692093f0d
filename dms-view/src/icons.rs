use std::path::Path;

use crate::model::NodeKind;

/// Presentation icon chosen for a listed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icon {
    Folder,
    Image,
    Video,
    Audio,
    Archive,
    Pdf,
    Document,
    Spreadsheet,
    Presentation,
    Code,
    Text,
    Generic,
}

impl Icon {
    pub fn name(self) -> &'static str {
        match self {
            Icon::Folder => "folder",
            Icon::Image => "image",
            Icon::Video => "movie",
            Icon::Audio => "audiotrack",
            Icon::Archive => "archive",
            Icon::Pdf => "picture_as_pdf",
            Icon::Document => "description",
            Icon::Spreadsheet => "table_chart",
            Icon::Presentation => "slideshow",
            Icon::Code => "code",
            Icon::Text => "article",
            Icon::Generic => "insert_drive_file",
        }
    }
}

pub fn icon_for(name: &str, kind: NodeKind) -> Icon {
    if kind == NodeKind::Folder {
        return Icon::Folder;
    }

    let ext = Path::new(name)
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp" | "tif" | "tiff" | "heic") => {
            Icon::Image
        }
        Some("mp4" | "mov" | "mkv" | "avi" | "webm") => Icon::Video,
        Some("mp3" | "wav" | "flac" | "m4a" | "aac" | "ogg") => Icon::Audio,
        Some("zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz") => Icon::Archive,
        Some("pdf") => Icon::Pdf,
        Some("doc" | "docx" | "odt" | "rtf") => Icon::Document,
        Some("xls" | "xlsx" | "ods" | "csv") => Icon::Spreadsheet,
        Some("ppt" | "pptx" | "odp") => Icon::Presentation,
        Some(
            "rs" | "js" | "ts" | "py" | "go" | "java" | "c" | "cpp" | "h" | "sh" | "html" | "css"
            | "xml" | "json",
        ) => Icon::Code,
        Some("txt" | "md" | "log" | "toml" | "yaml" | "yml") => Icon::Text,
        _ => Icon::Generic,
    }
}
