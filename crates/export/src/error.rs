use thiserror::Error;

use magalia_core::errors::ApplicationError;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("word template is unusable: {0}")]
    Template(String),
    #[error("document archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExportError> for ApplicationError {
    fn from(error: ExportError) -> Self {
        ApplicationError::Rendering(error.to_string())
    }
}
