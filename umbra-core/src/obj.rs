/// Wavefront OBJ parser for positions, texture coordinates, normals and faces
use std::fs;
use std::path::Path;
use std::str::SplitWhitespace;

use nalgebra::{Vector3, Vector4};
use nom::{
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt},
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::error::IngestionError;
use crate::geometry::{Face, FaceVertexRef, MeshTables};

/// Read and parse an OBJ file
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<MeshTables, IngestionError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| IngestionError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let tables = parse_obj(&source)?;
    log::debug!(
        "Parsed {}: {} positions, {} texcoords, {} normals, {} faces",
        path.display(),
        tables.positions.len(),
        tables.texcoords.len(),
        tables.normals.len(),
        tables.faces.len()
    );
    Ok(tables)
}

/// Parse OBJ source text. Unknown directives are skipped.
pub fn parse_obj(source: &str) -> Result<MeshTables, IngestionError> {
    let mut tables = MeshTables::default();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let content = match raw.find('#') {
            Some(comment) => &raw[..comment],
            None => raw,
        };

        let mut words = content.split_whitespace();
        let Some(tag) = words.next() else {
            continue;
        };

        match tag {
            "v" => {
                let mut values = Values::new(line, "v", words);
                let x = values.required(3)?;
                let y = values.required(3)?;
                let z = values.required(3)?;
                let w = values.optional(1.0)?;
                tables.positions.push(Vector4::new(x, y, z, w));
            }
            "vt" => {
                let mut values = Values::new(line, "vt", words);
                let u = values.required(1)?;
                let v = values.optional(0.0)?;
                let w = values.optional(0.0)?;
                tables.texcoords.push(Vector3::new(u, v, w));
            }
            "vn" => {
                let mut values = Values::new(line, "vn", words);
                let x = values.required(3)?;
                let y = values.required(3)?;
                let z = values.required(3)?;
                tables.normals.push(Vector3::new(x, y, z));
            }
            "vp" => {
                let mut values = Values::new(line, "vp", words);
                let u = values.required(1)?;
                let v = values.optional(0.0)?;
                let w = values.optional(0.0)?;
                tables.params.push(Vector3::new(u, v, w));
            }
            "f" => tables.faces.push(parse_face(line, words)?),
            _ => {}
        }
    }

    Ok(tables)
}

/// Left-to-right numeric consumer for one directive
struct Values<'a> {
    line: usize,
    directive: &'static str,
    words: SplitWhitespace<'a>,
}

impl<'a> Values<'a> {
    fn new(line: usize, directive: &'static str, words: SplitWhitespace<'a>) -> Self {
        Self {
            line,
            directive,
            words,
        }
    }

    fn required(&mut self, expected: usize) -> Result<f32, IngestionError> {
        match self.words.next() {
            Some(word) => parse_number(self.line, word),
            None => Err(IngestionError::MissingComponent {
                line: self.line,
                directive: self.directive,
                expected,
            }),
        }
    }

    fn optional(&mut self, default: f32) -> Result<f32, IngestionError> {
        match self.words.next() {
            Some(word) => parse_number(self.line, word),
            None => Ok(default),
        }
    }
}

fn parse_number(line: usize, word: &str) -> Result<f32, IngestionError> {
    all_consuming(float::<&str, nom::error::Error<&str>>)(word)
        .map(|(_, value)| value)
        .map_err(|_| IngestionError::InvalidNumber {
            line,
            token: word.to_string(),
        })
}

fn parse_face(line: usize, words: SplitWhitespace<'_>) -> Result<Face, IngestionError> {
    let mut vertices = Vec::new();
    for word in words {
        let (_, (position, texcoord, normal)) = all_consuming(face_vertex)(word)
            .map_err(|_| IngestionError::InvalidFaceVertex {
                line,
                token: word.to_string(),
            })?;

        // Texture and normal may be left empty, the position may not
        let Some(position) = position else {
            return Err(IngestionError::InvalidFaceVertex {
                line,
                token: word.to_string(),
            });
        };
        vertices.push(FaceVertexRef::new(position, texcoord, normal));
    }

    if vertices.len() < 3 {
        return Err(IngestionError::DegenerateFace {
            line,
            count: vertices.len(),
        });
    }

    Ok(Face { line, vertices })
}

fn index(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}

/// `p`, `p/t`, `p//n`, `p/t/n`; empty fields are absent
fn face_vertex(input: &str) -> IResult<&str, (Option<usize>, Option<usize>, Option<usize>)> {
    let (input, position) = opt(index)(input)?;
    let (input, texcoord) = opt(preceded(char('/'), opt(index)))(input)?;
    let (input, normal) = opt(preceded(char('/'), opt(index)))(input)?;
    Ok((input, (position, texcoord.flatten(), normal.flatten())))
}
