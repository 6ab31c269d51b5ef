// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parser for Tesseract's TSV output.
//
// Columns: level page_num block_num par_num line_num word_num left top
// width height conf text. Only level 5 (word) rows carry text.

use scanlayer_core::types::{LineKey, OcrWord, PixelBox};

const WORD_LEVEL: u32 = 5;
const COLUMNS: usize = 12;

/// Extract recognized words in engine order.
///
/// Rows with empty text or a negative confidence (Tesseract's marker for
/// layout-only rows) are dropped. Malformed rows are skipped.
pub fn parse_words(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();

    for row in tsv.lines() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < COLUMNS {
            continue;
        }
        // Header row has "level" in column 0 and fails this parse.
        let Ok(level) = cols[0].trim().parse::<u32>() else {
            continue;
        };
        if level != WORD_LEVEL {
            continue;
        }

        let text = cols[COLUMNS - 1..].join("\t");
        let text = text.trim();
        let conf: f64 = cols[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let num = |i: usize| cols[i].trim().parse::<f64>().ok();
        let (Some(left), Some(top), Some(width), Some(height)) = (num(6), num(7), num(8), num(9))
        else {
            continue;
        };
        let id = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);

        words.push(OcrWord::new(
            text,
            PixelBox::new(left, top, width, height),
            conf,
            LineKey {
                block: id(2),
                paragraph: id(3),
                line: id(4),
            },
        ));
    }

    words
}
