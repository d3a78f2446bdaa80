// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Integration tests for chatmd2pdf parsing, rendering and pagination.

use chatmd2pdf::export::{
    self, CollaboratorError, DocumentWriter, ExportError, ExportOptions, OutputFormat, PageImage,
    Rasterizer,
};
use chatmd2pdf::paginate::{self, Bitmap, GeometryError, PageSize};
use chatmd2pdf::parser::{self, Block};
use chatmd2pdf::renderer;
use chrono::NaiveDate;
use proptest::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Rasterizes at 2x with a height proportional to the markup length.
struct ProportionalRasterizer;

impl Rasterizer for ProportionalRasterizer {
    fn rasterize(&mut self, markup: &str, width: u32) -> Result<Bitmap, CollaboratorError> {
        let height = u32::try_from(markup.len())?;
        Ok(Bitmap::blank(width * 2, height)?)
    }
}

/// Writes each page as a raw RGBA file inside a directory named after the
/// document.
struct DirectoryWriter {
    root: PathBuf,
}

impl DocumentWriter for DirectoryWriter {
    fn write_pages(&mut self, pages: &[PageImage], file_name: &str) -> Result<(), CollaboratorError> {
        let dir = self.root.join(file_name);
        fs::create_dir_all(&dir)?;
        for page in pages {
            fs::write(dir.join(format!("{:03}.rgba", page.slice.index)), page.image.pixels())?;
        }
        Ok(())
    }

    fn write_image(&mut self, image: &Bitmap, file_name: &str) -> Result<(), CollaboratorError> {
        fs::write(self.root.join(file_name), image.pixels())?;
        Ok(())
    }
}

fn export_options(format: OutputFormat) -> ExportOptions {
    ExportOptions {
        format,
        date: NaiveDate::from_ymd_opt(2025, 1, 31),
        ..Default::default()
    }
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).expect("Failed to read output directory").count()
}

const SAMPLE_ANSWER: &str = "\
# Sorting in Rust

Use `sort_unstable` when **stability** does not matter:

```rust
let mut v = vec![3, 1, 2];
v.sort_unstable();
```

| Method | Stable |
|--------|:------:|
| `sort` | yes |
| `sort_unstable` | no |

> Benchmarks vary by input.
> Measure first.

1. Pick a method
2. Measure
- see [the docs](https://doc.rust-lang.org/std/primitive.slice.html#method.sort)
";

/// Tests the block structure of a realistic assistant answer.
#[test]
fn parses_sample_answer() {
    let blocks = parser::parse(SAMPLE_ANSWER);

    let kinds: Vec<&str> = blocks
        .iter()
        .map(|b| match b {
            Block::Heading { .. } => "heading",
            Block::Paragraph { .. } => "paragraph",
            Block::BulletList { .. } => "bullet",
            Block::OrderedList { .. } => "ordered",
            Block::Blockquote { .. } => "quote",
            Block::CodeBlock { .. } => "code",
            Block::Table { .. } => "table",
        })
        .collect();

    assert_eq!(
        kinds,
        ["heading", "paragraph", "code", "table", "quote", "ordered", "bullet"]
    );
}

/// Tests the fenced code round trip with a language tag.
#[test]
fn code_block_round_trip() {
    let blocks = parser::parse("```js\nconsole.log(1)\n```");

    assert_eq!(
        blocks,
        [Block::CodeBlock {
            language: Some("js".into()),
            code: "console.log(1)".into(),
        }]
    );

    let html = renderer::render_blocks(&blocks);
    assert_eq!(
        html,
        "<pre><code class=\"language-js\">console.log(1)</code></pre>"
    );
}

/// Tests that the divider row decides between a table and paragraphs.
#[test]
fn table_detection_depends_on_divider() {
    let table = parser::parse("A|B\n-|-\n1|2");
    let Block::Table { header, rows } = &table[0] else {
        panic!("expected a table, got {table:?}");
    };
    assert_eq!(header.len(), 2);
    assert!(header[0] == "A" && header[1] == "B");
    assert_eq!(rows.len(), 1);
    assert!(rows[0][0] == "1" && rows[0][1] == "2");

    let no_divider = parser::parse("A|B\n1|2");
    assert!(!no_divider.is_empty());
    assert!(no_divider.iter().all(|b| matches!(b, Block::Paragraph { .. })));
}

/// Tests that adjacent lists of different kinds stay separate.
#[test]
fn list_kind_switch_splits_lists() {
    let blocks = parser::parse("- a\n1. b");

    assert_eq!(blocks.len(), 2);
    assert!(matches!(&blocks[0], Block::BulletList { items } if items.len() == 1 && items[0] == "a"));
    assert!(matches!(&blocks[1], Block::OrderedList { items } if items.len() == 1 && items[0] == "b"));
}

/// Tests that emphasis markers inside a code span stay literal.
#[test]
fn code_span_takes_precedence_over_emphasis() {
    let blocks = parser::parse("`**x**`");

    assert!(matches!(&blocks[0], Block::Paragraph { text } if *text == "<code>**x**</code>"));
    assert!(!renderer::render_blocks(&blocks).contains("<strong>"));
}

/// Tests the worked pagination example and its geometry rejection.
#[test]
fn paginates_worked_example() {
    let page = PageSize {
        width: 450.0,
        height: 200.0,
    };
    let slices = paginate::paginate(&Bitmap::blank(900, 900).unwrap(), page).unwrap();

    let heights: Vec<u32> = slices.iter().map(|s| s.height).collect();
    assert_eq!(heights, [400, 400, 100]);
    assert_eq!(heights.iter().sum::<u32>(), 900);

    let flat = PageSize {
        width: 450.0,
        height: 0.0,
    };
    assert!(matches!(
        paginate::paginate(&Bitmap::blank(900, 900).unwrap(), flat),
        Err(GeometryError::InvalidPageSize { .. })
    ));
}

/// Tests a full PDF export written to disk.
#[test]
fn exports_pages_to_directory() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let mut writer = DirectoryWriter {
        root: tmp.path().to_path_buf(),
    };

    let summary = export::export(
        SAMPLE_ANSWER,
        &export_options(OutputFormat::Pdf),
        &mut ProportionalRasterizer,
        &mut writer,
    )
    .unwrap();

    assert_eq!(summary.file_name, "chat-Sorting in Rust-2025-01-31.pdf");
    assert!(summary.pages >= 1);

    let doc_dir = tmp.path().join(&summary.file_name);
    assert_eq!(count_files(&doc_dir), summary.pages);

    // Every page but the last holds a full band of rows
    let row_bytes = 1920 * paginate::BYTES_PER_PIXEL as u64;
    let first = fs::metadata(doc_dir.join("000.rgba")).unwrap().len();
    assert_eq!(first % row_bytes, 0);
}

/// Tests a PNG export written to disk.
#[test]
fn exports_single_image() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let mut writer = DirectoryWriter {
        root: tmp.path().to_path_buf(),
    };

    let summary = export::export(
        "just a line",
        &export_options(OutputFormat::Png),
        &mut ProportionalRasterizer,
        &mut writer,
    )
    .unwrap();

    assert_eq!(summary.file_name, "chat-just a line-2025-01-31.png");
    assert!(tmp.path().join(&summary.file_name).is_file());
}

/// Tests that blank input is reported rather than written.
#[test]
fn blank_input_exports_nothing() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let mut writer = DirectoryWriter {
        root: tmp.path().to_path_buf(),
    };

    let err = export::export(
        "\n\n   \n",
        &export_options(OutputFormat::Pdf),
        &mut ProportionalRasterizer,
        &mut writer,
    )
    .unwrap_err();

    assert!(matches!(err, ExportError::EmptyDocument));
    assert_eq!(count_files(tmp.path()), 0);
}

/// Tests that a code span used as a link target keeps its text.
#[test]
fn code_span_in_link_target_is_kept() {
    let blocks = parser::parse("see [docs](`cmd --help`)");
    let Block::Paragraph { text } = &blocks[0] else {
        panic!("expected a paragraph, got {blocks:?}");
    };

    assert!(text.as_markup().contains("cmd --help"));
    assert!(text.as_markup().contains(">docs</a>"));
    assert!(!text.as_markup().contains(['\u{E000}', '\u{E001}']));
}

/// Tests that two inputs with the same title both survive one CLI run.
#[test]
fn cli_keeps_inputs_with_same_title() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let first = tmp.path().join("a.md");
    let second = tmp.path().join("b.md");
    fs::write(&first, "# Summary\n\nfirst answer").unwrap();
    fs::write(&second, "# Summary\n\nsecond answer").unwrap();
    let out = tmp.path().join("out");

    let status = Command::new(env!("CARGO_BIN_EXE_chatmd2pdf"))
        .arg("-q")
        .arg("-f")
        .arg("-o")
        .arg(&out)
        .arg(&first)
        .arg(&second)
        .status()
        .expect("Failed to run chatmd2pdf");
    assert!(status.success());

    let mut names: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("chat-Summary-") && names[0].ends_with(" (2).html"));
    assert!(names[1].starts_with("chat-Summary-") && !names[1].contains(" (2)"));

    let contents: Vec<String> = names
        .iter()
        .map(|name| fs::read_to_string(out.join(name)).unwrap())
        .collect();
    assert!(contents[1].contains("first answer"));
    assert!(contents[0].contains("second answer"));
}

/// Concatenates every piece of text the parser kept.
fn kept_text(blocks: &[Block]) -> String {
    let mut text = String::new();
    for block in blocks {
        match block {
            Block::Heading { text: t, .. }
            | Block::Paragraph { text: t }
            | Block::Blockquote { text: t } => text.push_str(t.as_markup()),
            Block::BulletList { items } | Block::OrderedList { items } => {
                items.iter().for_each(|i| text.push_str(i.as_markup()));
            }
            Block::CodeBlock { language, code } => {
                text.push_str(language.as_deref().unwrap_or_default());
                text.push_str(code);
            }
            Block::Table { header, rows } => {
                header
                    .iter()
                    .chain(rows.iter().flatten())
                    .for_each(|cell| text.push_str(cell.as_markup()));
            }
        }
    }
    text
}

/// Counts each lowercase ASCII letter.
fn letter_counts(s: &str) -> [usize; 26] {
    let mut counts = [0; 26];
    for b in s.bytes().filter(u8::is_ascii_lowercase) {
        counts[usize::from(b - b'a')] += 1;
    }
    counts
}

proptest! {
    /// No text from a non-blank line is silently dropped.
    ///
    /// Letters are counted rather than matched in order: a link moves its
    /// target ahead of its label. Digits are left out since ordered list
    /// markers are consumed.
    #[test]
    fn prop_parse_keeps_all_text(
        lines in prop::collection::vec(
            prop_oneof![
                6 => "[a-z0-9 #>*_|:+.\"`()\\[\\]-]{0,14}",
                1 => "```[a-z]{0,3}",
                1 => "\\[[a-z]{1,3}\\]\\(`?[a-z_]{1,4}`?\\)",
            ],
            0..24,
        )
    ) {
        let markdown = lines.join("\n");
        let blocks = parser::parse(&markdown);
        let kept = kept_text(&blocks);

        let before = letter_counts(&markdown);
        let after = letter_counts(&kept);
        prop_assert!(
            before.iter().zip(&after).all(|(b, a)| b <= a),
            "lost text: {markdown:?} -> {kept:?}"
        );
    }

    /// Arbitrary input never panics and never yields empty list blocks.
    #[test]
    fn prop_parse_is_total(markdown in any::<String>()) {
        for block in parser::parse(&markdown) {
            if let Block::BulletList { items } | Block::OrderedList { items } = block {
                prop_assert!(!items.is_empty());
            }
        }
    }
}
