//! Parser for the legacy block-structured profile format: nested named
//! blocks of the form `Keyword ( value ... )`, whitespace separated, with
//! quoted strings and `//` line comments. Unknown blocks are skipped with a
//! log line so newer files still load on older builds.

use bevy::prelude::*;

use super::error::ProfileError;
use super::{
    Lod, LodItem, LodMethod, PitchControl, PositionControl, ProfilePolyline, ProfileVertex,
    SuperElevationStyle, TrackProfile,
};

// ------------------------------------------------------------
// Lexer / tokens
// ------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Word(String),
}

struct Tokenizer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            let c = *self.chars.peek()?;
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            if c == '/' {
                // Line comment; anything else starting with '/' is a word.
                let mut probe = self.chars.clone();
                probe.next();
                if probe.peek() == Some(&'/') {
                    for c in self.chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                    continue;
                }
            }
            break;
        }
        let c = *self.chars.peek()?;
        if c == '(' {
            self.chars.next();
            return Some(Token::Open);
        }
        if c == ')' {
            self.chars.next();
            return Some(Token::Close);
        }
        if c == '"' {
            self.chars.next();
            let mut s = String::new();
            for c in self.chars.by_ref() {
                if c == '"' {
                    break;
                }
                s.push(c);
            }
            return Some(Token::Word(s));
        }
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                break;
            }
            s.push(c);
            self.chars.next();
        }
        Some(Token::Word(s))
    }
}

// ------------------------------------------------------------
// Block reader
// ------------------------------------------------------------

struct BlockReader<'a> {
    tokens: Tokenizer<'a>,
}

impl<'a> BlockReader<'a> {
    fn expect_open(&mut self, context: &str) -> Result<(), ProfileError> {
        match self.tokens.next_token() {
            Some(Token::Open) => Ok(()),
            other => Err(ProfileError::Malformed(format!(
                "expected ( after {context}, found {other:?}"
            ))),
        }
    }

    /// Consume tokens until the matching close of an already-open block.
    fn skip_rest_of_block(&mut self) -> Result<(), ProfileError> {
        let mut depth = 1;
        while depth > 0 {
            match self.tokens.next_token() {
                Some(Token::Open) => depth += 1,
                Some(Token::Close) => depth -= 1,
                Some(Token::Word(_)) => {}
                None => {
                    return Err(ProfileError::Malformed(
                        "unexpected end of file inside a block".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Skip a block whose keyword has just been read but whose `(` has not.
    fn skip_block(&mut self, keyword: &str) -> Result<(), ProfileError> {
        self.expect_open(keyword)?;
        self.skip_rest_of_block()
    }

    fn read_string_block(&mut self, context: &str) -> Result<String, ProfileError> {
        self.expect_open(context)?;
        let value = match self.tokens.next_token() {
            Some(Token::Word(s)) => s,
            other => {
                return Err(ProfileError::Malformed(format!(
                    "expected a value in {context}, found {other:?}"
                )))
            }
        };
        self.skip_rest_of_block()?;
        Ok(value)
    }

    fn read_f32_block(&mut self, context: &str) -> Result<f32, ProfileError> {
        let s = self.read_string_block(context)?;
        s.parse::<f32>()
            .map_err(|_| ProfileError::BadNumber(format!("{context}: {s}")))
    }

    fn read_i32_block(&mut self, context: &str) -> Result<i32, ProfileError> {
        let s = self.read_string_block(context)?;
        s.parse::<i32>()
            .map_err(|_| ProfileError::BadNumber(format!("{context}: {s}")))
    }

    /// Read a block of 2..=max whitespace-separated floats.
    fn read_floats_block(&mut self, context: &str, max: usize) -> Result<Vec<f32>, ProfileError> {
        self.expect_open(context)?;
        let mut values = Vec::new();
        loop {
            match self.tokens.next_token() {
                Some(Token::Close) => break,
                Some(Token::Word(s)) => {
                    if values.len() == max {
                        return Err(ProfileError::Malformed(format!(
                            "too many values in {context}"
                        )));
                    }
                    values.push(
                        s.parse::<f32>()
                            .map_err(|_| ProfileError::BadNumber(format!("{context}: {s}")))?,
                    );
                }
                other => {
                    return Err(ProfileError::Malformed(format!(
                        "unexpected {other:?} in {context}"
                    )))
                }
            }
        }
        if values.len() < 2 {
            return Err(ProfileError::Malformed(format!(
                "expected at least 2 values in {context}"
            )));
        }
        Ok(values)
    }

    fn read_filter_block(&mut self, context: &str) -> Result<Vec<String>, ProfileError> {
        let list = self.read_string_block(context)?;
        Ok(list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

// ------------------------------------------------------------
// Profile parsing
// ------------------------------------------------------------

/// Parse a legacy `.dat` profile document. `gauge` seeds the profile's gauge
/// when the file does not override it.
pub fn parse_legacy_profile(text: &str, gauge: f32) -> Result<TrackProfile, ProfileError> {
    let mut reader = BlockReader {
        tokens: Tokenizer::new(text),
    };

    match reader.tokens.next_token() {
        Some(Token::Word(w)) if w.eq_ignore_ascii_case("trprofile") => {}
        other => {
            return Err(ProfileError::Malformed(format!(
                "expected TrProfile root block, found {other:?}"
            )))
        }
    }

    let mut profile = TrackProfile::empty("Default track profile");
    profile.gauge = gauge;

    reader.expect_open("TrProfile")?;
    loop {
        match reader.tokens.next_token() {
            Some(Token::Close) => break,
            Some(Token::Word(keyword)) => match keyword.to_ascii_lowercase().as_str() {
                "name" => profile.name = reader.read_string_block("Name")?,
                "lodmethod" => {
                    profile.lod_method = LodMethod::parse(&reader.read_string_block("LODMethod")?)
                }
                "chordspan" => profile.chord_span = reader.read_f32_block("ChordSpan")?,
                "pitchcontrol" => {
                    profile.pitch_control =
                        PitchControl::parse(&reader.read_string_block("PitchControl")?)
                }
                "pitchcontrolscalar" => {
                    profile.pitch_control_scalar = reader.read_f32_block("PitchControlScalar")?
                }
                "trackgauge" => profile.gauge = reader.read_f32_block("TrackGauge")?,
                "superelevationmethod" => {
                    profile.elevation_style = SuperElevationStyle::parse(
                        &reader.read_string_block("SuperElevationMethod")?,
                    )
                }
                "includedshapes" => {
                    profile.included_shapes = reader.read_filter_block("IncludedShapes")?
                }
                "excludedshapes" => {
                    profile.excluded_shapes = reader.read_filter_block("ExcludedShapes")?
                }
                "includedtextures" => {
                    profile.included_textures = reader.read_filter_block("IncludedTextures")?
                }
                "excludedtextures" => {
                    profile.excluded_textures = reader.read_filter_block("ExcludedTextures")?
                }
                "lod" => profile.lods.push(parse_lod(&mut reader)?),
                other => {
                    warn!("skipping unknown profile block {other}");
                    reader.skip_block(other)?;
                }
            },
            other => {
                return Err(ProfileError::Malformed(format!(
                    "unexpected {other:?} in TrProfile"
                )))
            }
        }
    }

    profile.finalize()
}

fn parse_lod(reader: &mut BlockReader) -> Result<Lod, ProfileError> {
    let mut lod = Lod::new(0.0);
    reader.expect_open("LOD")?;
    loop {
        match reader.tokens.next_token() {
            Some(Token::Close) => break,
            Some(Token::Word(keyword)) => match keyword.to_ascii_lowercase().as_str() {
                "cutoffradius" => lod.cutoff_radius = reader.read_f32_block("CutoffRadius")?,
                "loditem" => lod.items.push(parse_lod_item(reader)?),
                other => {
                    warn!("skipping unknown LOD block {other}");
                    reader.skip_block(other)?;
                }
            },
            other => {
                return Err(ProfileError::Malformed(format!("unexpected {other:?} in LOD")))
            }
        }
    }
    if lod.cutoff_radius == 0.0 {
        return Err(ProfileError::MissingField("CutoffRadius".to_string()));
    }
    Ok(lod)
}

fn parse_lod_item(reader: &mut BlockReader) -> Result<LodItem, ProfileError> {
    let mut item = LodItem::named("");
    reader.expect_open("LODItem")?;
    loop {
        match reader.tokens.next_token() {
            Some(Token::Close) => break,
            Some(Token::Word(keyword)) => match keyword.to_ascii_lowercase().as_str() {
                "name" => item.name = reader.read_string_block("Name")?,
                "texname" => item.tex_name = reader.read_string_block("TexName")?,
                "shadername" => item.shader_name = reader.read_string_block("ShaderName")?,
                "lightmodelname" => {
                    item.light_model_name = reader.read_string_block("LightModelName")?
                }
                "alphatestmode" => item.alpha_test_mode = reader.read_i32_block("AlphaTestMode")?,
                "texaddrmodename" => {
                    item.tex_addr_mode = reader.read_string_block("TexAddrModeName")?
                }
                "alternatetexture" => {
                    item.alternate_texture = reader.read_i32_block("AlternateTexture")?.max(0) as u32
                }
                "mipmaplevelofdetailbias" => {
                    item.mip_bias = reader.read_f32_block("MipMapLevelOfDetailBias")?
                }
                "polyline" => item.polylines.push(parse_polyline(reader)?),
                other => {
                    warn!("skipping unknown LODItem block {other}");
                    reader.skip_block(other)?;
                }
            },
            other => {
                return Err(ProfileError::Malformed(format!(
                    "unexpected {other:?} in LODItem"
                )))
            }
        }
    }
    if item.polylines.is_empty() {
        return Err(ProfileError::MissingPolylines(item.name));
    }
    Ok(item)
}

fn parse_polyline(reader: &mut BlockReader) -> Result<ProfilePolyline, ProfileError> {
    let mut polyline = ProfilePolyline::default();
    reader.expect_open("Polyline")?;
    loop {
        match reader.tokens.next_token() {
            Some(Token::Close) => break,
            Some(Token::Word(keyword)) => match keyword.to_ascii_lowercase().as_str() {
                "name" => polyline.name = reader.read_string_block("Name")?,
                "deltatexcoord" => {
                    let v = reader.read_floats_block("DeltaTexCoord", 2)?;
                    polyline.delta_tex_coord = Vec2::new(v[0], v[1]);
                }
                "vertex" => polyline.vertices.push(parse_vertex(reader)?),
                other => {
                    warn!("skipping unknown Polyline block {other}");
                    reader.skip_block(other)?;
                }
            },
            other => {
                return Err(ProfileError::Malformed(format!(
                    "unexpected {other:?} in Polyline"
                )))
            }
        }
    }
    if polyline.vertices.is_empty() {
        return Err(ProfileError::MissingVertices(polyline.name));
    }
    // The legacy format has no way to express "no wrap"; a zero delta always
    // means an authoring mistake.
    if polyline.delta_tex_coord == Vec2::ZERO {
        return Err(ProfileError::ZeroDeltaTexCoord(polyline.name));
    }
    Ok(polyline)
}

fn parse_vertex(reader: &mut BlockReader) -> Result<ProfileVertex, ProfileError> {
    let mut position = None;
    let mut normal = None;
    let mut tex_coord = None;
    let mut control = PositionControl::All;
    reader.expect_open("Vertex")?;
    loop {
        match reader.tokens.next_token() {
            Some(Token::Close) => break,
            Some(Token::Word(keyword)) => match keyword.to_ascii_lowercase().as_str() {
                "position" => {
                    let v = reader.read_floats_block("Position", 3)?;
                    // z is the cross-section plane and defaults to 0.
                    position = Some(Vec3::new(v[0], v[1], v.get(2).copied().unwrap_or(0.0)));
                }
                "normal" => {
                    let v = reader.read_floats_block("Normal", 3)?;
                    normal = Some(Vec3::new(v[0], v[1], v.get(2).copied().unwrap_or(0.0)));
                }
                "texcoord" => {
                    let v = reader.read_floats_block("TexCoord", 2)?;
                    tex_coord = Some(Vec2::new(v[0], v[1]));
                }
                "positioncontrol" => {
                    control = PositionControl::parse(&reader.read_string_block("PositionControl")?)
                }
                other => {
                    warn!("skipping unknown Vertex block {other}");
                    reader.skip_block(other)?;
                }
            },
            other => {
                return Err(ProfileError::Malformed(format!(
                    "unexpected {other:?} in Vertex"
                )))
            }
        }
    }
    let position = position.ok_or_else(|| ProfileError::MissingField("Position".to_string()))?;
    let normal = normal.ok_or_else(|| ProfileError::MissingField("Normal".to_string()))?;
    if normal == Vec3::ZERO {
        return Err(ProfileError::Malformed("zero vertex normal".to_string()));
    }
    let tex_coord = tex_coord.ok_or_else(|| ProfileError::MissingField("TexCoord".to_string()))?;
    Ok(ProfileVertex {
        position,
        normal,
        tex_coord,
        position_control: control,
    })
}
