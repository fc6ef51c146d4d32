use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

use super::setup::TesseractPaths;
use super::{Detection, Recognizer};
use crate::catalog::RecognitionHints;

/// Tesseract page segmentation mode for a single text line, used when a
/// region does not ask for another one
pub const DEFAULT_PAGE_SEGMENTATION_MODE: u8 = 7;

/// Recognizer backed by the `tesseract` command-line tool.
///
/// Each call writes the region to a temporary PNG, runs Tesseract with TSV
/// output and converts each phrase into a [`Detection`]. The region's
/// recognition hints choose the segmentation mode and character whitelist.
pub struct TesseractRecognizer {
    paths: TesseractPaths,
    language: String,
    page_segmentation_mode: u8,
}

impl TesseractRecognizer {
    pub fn new(paths: TesseractPaths) -> Self {
        Self {
            paths,
            language: "eng".to_string(),
            page_segmentation_mode: DEFAULT_PAGE_SEGMENTATION_MODE,
        }
    }

    /// Locates the executable and tessdata on this machine.
    pub fn discover() -> Result<Self> {
        Ok(Self::new(TesseractPaths::discover()?))
    }

    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.page_segmentation_mode = psm;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn paths(&self) -> &TesseractPaths {
        &self.paths
    }
}

impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage, hints: &RecognitionHints) -> Result<Vec<Detection>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .save(temp_input.path())
            .context("Failed to write recognizer input image")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let psm = hints
            .page_segmentation_mode
            .unwrap_or(self.page_segmentation_mode);

        let mut command = Command::new(&self.paths.executable);
        command
            .arg(temp_input.path())
            .arg(&output_base)
            .arg("--tessdata-dir")
            .arg(&self.paths.tessdata)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(psm.to_string());
        if let Some(whitelist) = &hints.char_whitelist {
            command
                .arg("-c")
                .arg(format!("tessedit_char_whitelist={}", whitelist));
        }
        command.arg("tsv");

        let output = command.output().with_context(|| {
            format!("Failed to run {}", self.paths.executable.display())
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        let detections = parse_tsv_output(&tsv_content);
        debug!(
            "Tesseract (psm {}) returned {} phrases for {}x{} image",
            psm,
            detections.len(),
            image.width(),
            image.height()
        );
        Ok(detections)
    }
}

/// One word row of Tesseract TSV output.
#[derive(Debug)]
struct Word {
    line_key: (u32, u32, u32, u32),
    left: f32,
    top: f32,
    width: f32,
    height: f32,
    confidence: f32,
    text: String,
}

impl Word {
    fn parse(line: &str) -> Option<Self> {
        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            return None;
        }

        let level: i32 = fields[0].trim().parse().ok()?;
        if level != 5 {
            return None;
        }

        let text = fields[11].trim();
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            return None;
        }

        let index = |i: usize| fields[i].trim().parse::<u32>().unwrap_or(0);
        let coord = |i: usize| fields[i].trim().parse::<f32>().unwrap_or(0.0);
        Some(Self {
            line_key: (index(1), index(2), index(3), index(4)),
            left: coord(6),
            top: coord(7),
            width: coord(8),
            height: coord(9),
            confidence: conf / 100.0,
            text: text.to_string(),
        })
    }

    fn right(&self) -> f32 {
        self.left + self.width
    }

    fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// True when `next` continues this phrase on the same text line.
    fn joins(&self, next: &Word) -> bool {
        let gap = next.left - self.right();
        self.line_key == next.line_key && gap <= WORD_GAP_RATIO * self.height.max(next.height)
    }

    fn absorb(&mut self, next: Word) {
        let right = self.right().max(next.right());
        let bottom = self.bottom().max(next.bottom());
        self.left = self.left.min(next.left);
        self.top = self.top.min(next.top);
        self.width = right - self.left;
        self.height = bottom - self.top;
        self.confidence = self.confidence.min(next.confidence);
        self.text.push(' ');
        self.text.push_str(&next.text);
    }
}

/// Largest gap between words of one phrase, as a multiple of the text height
const WORD_GAP_RATIO: f32 = 1.0;

/// Parses Tesseract TSV output into phrase detections.
///
/// Word rows (level 5) with text and a non-negative confidence are kept.
/// Consecutive words on the same text line are joined into one detection
/// unless a gap wider than the text height separates them, so a name with a
/// team tag stays whole while separate table cells stay apart. A phrase
/// reports the lowest confidence of its words.
pub fn parse_tsv_output(tsv: &str) -> Vec<Detection> {
    let mut phrases: Vec<Word> = Vec::new();

    for word in tsv.lines().skip(1).filter_map(Word::parse) {
        match phrases.last_mut() {
            Some(current) if current.joins(&word) => current.absorb(word),
            _ => phrases.push(word),
        }
    }

    phrases
        .into_iter()
        .map(|p| Detection::from_rect(&p.text, p.left, p.top, p.width, p.height, p.confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::{reconstruct, LeaderboardSettings};

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_word_rows() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t420\t600\t-1\t\n\
             4\t1\t1\t1\t1\t0\t12\t290\t120\t20\t-1\t\n\
             5\t1\t1\t1\t1\t1\t12\t290\t60\t20\t91.5\tJ.Rider\n\
             5\t1\t1\t1\t2\t1\t95\t320\t40\t18\t87\t3.1w/kg\n"
        );

        let detections = parse_tsv_output(&tsv);

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].text, "J.Rider");
        assert_eq!(detections[0].x(), 12.0);
        assert_eq!(detections[0].y(), 300.0);
        assert!((detections[0].confidence - 0.915).abs() < 1e-6);
        assert_eq!(detections[1].text, "3.1w/kg");
    }

    #[test]
    fn test_skips_empty_and_unscored_words() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t95\t   \n\
             5\t1\t1\t1\t1\t2\t0\t0\t10\t10\t-1\tghost\n\
             5\t1\t1\t1\t1\t3\t0\t0\t10\t10\t60\t268w\n"
        );

        let detections = parse_tsv_output(&tsv);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].text, "268w");
    }

    #[test]
    fn test_malformed_rows_are_ignored() {
        let tsv = format!("{HEADER}\nnot\ta\tvalid\trow\n");
        assert!(parse_tsv_output(&tsv).is_empty());
        assert!(parse_tsv_output("").is_empty());
    }

    #[test]
    fn test_words_on_one_line_form_a_phrase() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t10\t5\t40\t20\t90\t12.4\n\
             5\t1\t1\t1\t1\t2\t56\t8\t30\t17\t70\tkm\n"
        );

        let detections = parse_tsv_output(&tsv);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].text, "12.4 km");
        assert_eq!(detections[0].x(), 10.0);
        assert_eq!(detections[0].quad.max_y(), 25.0);
        assert!((detections[0].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_wide_gap_and_new_line_split_phrases() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t95\t316\t60\t18\t88\t3.1w/kg\n\
             5\t1\t1\t1\t1\t2\t200\t316\t45\t18\t85\t6.3km\n\
             5\t1\t1\t1\t2\t1\t210\t340\t45\t18\t85\t+0:04\n"
        );

        let texts: Vec<String> = parse_tsv_output(&tsv).into_iter().map(|d| d.text).collect();
        assert_eq!(texts, vec!["3.1w/kg", "6.3km", "+0:04"]);
    }

    #[test]
    fn test_tagged_name_reconstructs_as_one_rider() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t420\t600\t-1\t\n\
             5\t1\t1\t1\t1\t1\t12\t290\t60\t20\t91\tJ.Rider\n\
             5\t1\t1\t1\t1\t2\t80\t290\t50\t20\t89\t(TEAM)\n\
             5\t1\t1\t1\t2\t1\t95\t316\t60\t18\t88\t3.1w/kg\n\
             5\t1\t1\t1\t2\t2\t200\t316\t45\t18\t85\t6.3km\n"
        );

        let entries = reconstruct(&parse_tsv_output(&tsv), &LeaderboardSettings::default());

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "J.Rider (TEAM)");
        assert_eq!(entries[0].watts_per_kg, Some(3.1));
        assert_eq!(entries[0].distance_km, Some(6.3));
        assert!(entries[0].is_current_rider);
    }
}
