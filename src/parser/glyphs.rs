//! Glyph outlines for painting shown text.
//!
//! Outlines come from the font program embedded in the PDF when there is
//! one. Standard fonts and unreadable programs fall back to a face bundled
//! from `typst-assets`, looked up by the decoded character. A glyph neither
//! source can draw is painted as a solid box so its ink is not lost.

use std::collections::HashMap;
use std::sync::OnceLock;

use tiny_skia::{Path, PathBuilder};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

use super::backend::{FontProgram, GlyphMapping};

/// Horizontal squeeze or stretch applied to fallback glyphs, at most.
const FALLBACK_STRETCH: (f32, f32) = (0.5, 2.0);

/// What to paint for one character code.
#[derive(Debug, Clone)]
pub(crate) enum Glyph {
    /// Outline in glyph space, one unit per em
    Outline(Path),
    /// Whitespace or an empty glyph
    Blank,
    /// No outline anywhere; painted as a box
    Missing,
}

/// Outline lookup and cache for one font resource.
pub(crate) struct FontOutlines {
    program: Option<FontProgram>,
    cache: HashMap<u32, Glyph>,
}

impl FontOutlines {
    pub fn new(program: Option<FontProgram>) -> Self {
        let program = program.filter(|p| match Face::parse(&p.data, 0) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("embedded font program unreadable ({}), using fallback", e);
                false
            }
        });
        Self {
            program,
            cache: HashMap::new(),
        }
    }

    /// The glyph for `code`, whose advance is `width` em.
    ///
    /// `decode` yields the character the code stands for; it only runs the
    /// first time a code is seen.
    pub fn glyph<F>(&mut self, code: u32, width: f32, decode: F) -> &Glyph
    where
        F: FnOnce() -> Option<char>,
    {
        let program = self.program.as_ref();
        self.cache
            .entry(code)
            .or_insert_with(|| build_glyph(program, code, width, decode()))
    }
}

fn build_glyph(program: Option<&FontProgram>, code: u32, width: f32, ch: Option<char>) -> Glyph {
    if ch.is_some_and(char::is_whitespace) {
        return Glyph::Blank;
    }

    if let Some(program) = program {
        if let Ok(face) = Face::parse(&program.data, 0) {
            if let Some(gid) = program_glyph(&face, &program.mapping, code, ch) {
                return outline(&face, gid, 1.0).map_or(Glyph::Blank, Glyph::Outline);
            }
        }
    }

    let Some(ch) = ch.filter(|c| !c.is_control()) else {
        return Glyph::Missing;
    };
    let Some(face) = fallback_face() else {
        return Glyph::Missing;
    };
    let Some(gid) = face.glyph_index(ch).filter(|g| g.0 != 0) else {
        return Glyph::Missing;
    };

    // Stretch the stand-in to the advance the document asked for
    let units = f32::from(face.units_per_em().max(1));
    let stretch = face
        .glyph_hor_advance(gid)
        .map(|adv| f32::from(adv) / units)
        .filter(|adv| *adv > 0.0 && width > 0.0)
        .map_or(1.0, |adv| (width / adv).clamp(FALLBACK_STRETCH.0, FALLBACK_STRETCH.1));
    outline(&face, gid, stretch).map_or(Glyph::Blank, Glyph::Outline)
}

/// Glyph id for `code` in an embedded program.
fn program_glyph(face: &Face, mapping: &GlyphMapping, code: u32, ch: Option<char>) -> Option<GlyphId> {
    let gid = match mapping {
        GlyphMapping::Identity => u16::try_from(code).ok().map(GlyphId),
        GlyphMapping::Table(map) => map.get(code as usize).copied().map(GlyphId),
        GlyphMapping::Simple => ch.and_then(|c| face.glyph_index(c)).or_else(|| {
            // Symbolic TrueType fonts map raw codes, often at U+F000
            face.tables().cmap?.subtables.into_iter().find_map(|sub| {
                sub.glyph_index(code)
                    .or_else(|| sub.glyph_index(code.saturating_add(0xF000)))
            })
        }),
    }?;
    (gid.0 != 0 && gid.0 < face.number_of_glyphs()).then_some(gid)
}

/// Collects a glyph outline into a tiny-skia path.
struct PathSink {
    builder: PathBuilder,
    sx: f32,
    sy: f32,
}

impl OutlineBuilder for PathSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x * self.sx, y * self.sy);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x * self.sx, y * self.sy);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder
            .quad_to(x1 * self.sx, y1 * self.sy, x * self.sx, y * self.sy);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(
            x1 * self.sx,
            y1 * self.sy,
            x2 * self.sx,
            y2 * self.sy,
            x * self.sx,
            y * self.sy,
        );
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Outline of `gid` scaled to one unit per em, stretched by `stretch` along x.
fn outline(face: &Face, gid: GlyphId, stretch: f32) -> Option<Path> {
    let scale = 1.0 / f32::from(face.units_per_em().max(1));
    let mut sink = PathSink {
        builder: PathBuilder::new(),
        sx: scale * stretch,
        sy: scale,
    };
    face.outline_glyph(gid, &mut sink)?;
    sink.builder.finish()
}

static FALLBACK_FONT: OnceLock<Option<&'static [u8]>> = OnceLock::new();

/// The bundled face used for fonts without a usable program.
///
/// Prefers an upright regular sans face.
fn fallback_face() -> Option<Face<'static>> {
    let data = FALLBACK_FONT.get_or_init(|| {
        let faces: Vec<(&'static [u8], Face<'static>)> = typst_assets::fonts()
            .filter_map(|data| Face::parse(data, 0).ok().map(|face| (data, face)))
            .collect();
        let upright = |face: &Face| !face.is_bold() && !face.is_italic() && !face.is_oblique();
        let chosen = faces
            .iter()
            .find(|(_, face)| upright(face) && family(face).is_some_and(|f| f.contains("Sans")))
            .or_else(|| faces.iter().find(|(_, face)| upright(face)))
            .or_else(|| faces.first())
            .map(|(data, _)| *data);
        match chosen {
            Some(_) => log::debug!("fallback font chosen from {} bundled faces", faces.len()),
            None => log::warn!("no bundled font parsed, text will be painted as boxes"),
        }
        chosen
    });
    data.and_then(|d| Face::parse(d, 0).ok())
}

fn family(face: &Face) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY)
        .find_map(|name| name.to_string())
}
