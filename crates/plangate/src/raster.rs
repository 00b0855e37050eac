//! PDF page rasterization via poppler.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::RasterError;

/// Renders document pages to PNG bytes.
///
/// The pipeline depends on this trait rather than on poppler directly so the
/// rendering backend can be swapped in tests and embedders.
pub trait PageRenderer: Send + Sync {
    fn page_count(&self, pdf: &Path) -> Result<usize, RasterError>;

    /// Renders one page (0-based index) to PNG bytes.
    fn render_page(&self, pdf: &Path, page_index: usize) -> Result<Vec<u8>, RasterError>;
}

/// Poppler-backed renderer shelling out to `pdftoppm` and `pdfinfo`.
pub struct PopplerRasterizer {
    dpi: u32,
}

impl PopplerRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

impl PageRenderer for PopplerRasterizer {
    fn page_count(&self, pdf: &Path) -> Result<usize, RasterError> {
        if !pdf.exists() {
            return Err(RasterError::ReadDocument {
                path: pdf.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }

        let output = Command::new("pdfinfo").arg(pdf).output().map_err(|e| {
            RasterError::PageCount(format!(
                "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

        if !output.status.success() {
            return Err(RasterError::PageCount(format!(
                "pdfinfo failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        parse_page_count(&String::from_utf8_lossy(&output.stdout))
    }

    fn render_page(&self, pdf: &Path, page_index: usize) -> Result<Vec<u8>, RasterError> {
        let _span = tracing::info_span!("raster.page", page = page_index).entered();

        // pdftoppm numbers pages from 1.
        let page_num = page_index + 1;
        let temp_dir = std::env::temp_dir();
        let output_prefix = temp_dir.join(format!("plangate_page_{}", uuid::Uuid::new_v4()));

        let output = Command::new("pdftoppm")
            .args([
                "-png",
                "-r",
                &self.dpi.to_string(),
                "-f",
                &page_num.to_string(),
                "-l",
                &page_num.to_string(),
            ])
            .arg(pdf)
            .arg(&output_prefix)
            .output()
            .map_err(|e| {
                RasterError::Render(format!(
                    "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(RasterError::Render(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        // pdftoppm pads the page suffix depending on the document's total
        // page count; probe the plausible variants.
        let image_path = find_rendered_output(&output_prefix, page_num).ok_or_else(|| {
            RasterError::Render("Failed to find rendered page image".to_string())
        })?;

        let bytes = std::fs::read(&image_path).map_err(|e| {
            RasterError::Render(format!("Failed to read rendered image: {}", e))
        })?;

        let _ = std::fs::remove_file(&image_path);
        Ok(bytes)
    }
}

fn parse_page_count(pdfinfo_stdout: &str) -> Result<usize, RasterError> {
    for line in pdfinfo_stdout.lines() {
        if let Some(count_str) = line.strip_prefix("Pages:") {
            return count_str.trim().parse::<usize>().map_err(|e| {
                RasterError::PageCount(format!("Unparseable page count: {}", e))
            });
        }
    }
    Err(RasterError::PageCount(
        "pdfinfo output had no Pages line".to_string(),
    ))
}

fn find_rendered_output(prefix: &Path, page_num: usize) -> Option<PathBuf> {
    let candidates = [
        format!("{}-{}.png", prefix.display(), page_num),
        format!("{}-{:02}.png", prefix.display(), page_num),
        format!("{}-{:03}.png", prefix.display(), page_num),
    ];
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}
