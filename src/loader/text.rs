use std::{collections::HashMap, str::FromStr};

use glam::{Vec2, Vec3};

use crate::{
    animation::{AnimationClip, AnimationFlags, AnimationKey},
    joint::{unit_quat_from_xyz, Joint},
    mesh::{Mesh, Triangle, Vertex, Weight},
    model::AssetModel,
};

use super::{parent_index, unit_rotation, ParseError};

pub const SUPPORTED_VERSION: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Quoted(&'a str),
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Word(word) => String::from(*word),
            Token::Quoted(text) => format!("\"{}\"", text),
            Token::OpenParen => String::from("("),
            Token::CloseParen => String::from(")"),
            Token::OpenBrace => String::from("{"),
            Token::CloseBrace => String::from("}"),
        }
    }
}

struct Lexer<'a> {
    source: &'a str,
    position: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            position: 0,
            line: 1,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.position..]
    }

    fn skip_blank(&mut self) {
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                let length = rest.find('\n').unwrap_or(rest.len());
                self.position += length;
                continue;
            }
            match rest.chars().next() {
                Some('\n') => {
                    self.line += 1;
                    self.position += 1;
                }
                Some(char) if char.is_whitespace() => self.position += char.len_utf8(),
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<(usize, Token<'a>)>, ParseError> {
        self.skip_blank();
        let rest = self.rest();
        let line = self.line;
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };
        let token = match first {
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            '{' => Token::OpenBrace,
            '}' => Token::CloseBrace,
            '"' => {
                let body = &rest[1..];
                let end = body.find(['"', '\n']).ok_or(ParseError::UnexpectedEof {
                    expected: "closing quote",
                })?;
                if body.as_bytes()[end] == b'\n' {
                    return Err(ParseError::UnexpectedToken {
                        line,
                        expected: "closing quote",
                        found: String::from("end of line"),
                    });
                }
                self.position += end + 2;
                return Ok(Some((line, Token::Quoted(&body[..end]))));
            }
            _ => {
                let length = rest
                    .find(|char: char| char.is_whitespace() || "(){}\"".contains(char))
                    .unwrap_or(rest.len());
                self.position += length;
                return Ok(Some((line, Token::Word(&rest[..length]))));
            }
        };
        self.position += 1;
        Ok(Some((line, token)))
    }
}

struct TextParser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<(usize, Token<'a>)>,
}

impl<'a> TextParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<Option<&Token<'a>>, ParseError> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next_token()?;
        }
        Ok(self.peeked.as_ref().map(|(_, token)| token))
    }

    fn next(&mut self, expected: &'static str) -> Result<(usize, Token<'a>), ParseError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self
                .lexer
                .next_token()?
                .ok_or(ParseError::UnexpectedEof { expected }),
        }
    }

    fn expect(&mut self, wanted: Token<'static>, expected: &'static str) -> Result<(), ParseError> {
        let (line, token) = self.next(expected)?;
        if token == wanted {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                line,
                expected,
                found: token.describe(),
            })
        }
    }

    fn word(&mut self, expected: &'static str) -> Result<(usize, &'a str), ParseError> {
        match self.next(expected)? {
            (line, Token::Word(word)) => Ok((line, word)),
            (line, token) => Err(ParseError::UnexpectedToken {
                line,
                expected,
                found: token.describe(),
            }),
        }
    }

    fn keyword(&mut self, keyword: &'static str) -> Result<(), ParseError> {
        let (line, word) = self.word(keyword)?;
        if word == keyword {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                line,
                expected: keyword,
                found: String::from(word),
            })
        }
    }

    fn string(&mut self, expected: &'static str) -> Result<String, ParseError> {
        match self.next(expected)? {
            (_, Token::Quoted(text)) => Ok(String::from(text)),
            (line, token) => Err(ParseError::UnexpectedToken {
                line,
                expected,
                found: token.describe(),
            }),
        }
    }

    fn number<T: FromStr>(&mut self, expected: &'static str) -> Result<(usize, T), ParseError> {
        let (line, word) = self.word(expected)?;
        word.parse().map(|number| (line, number)).map_err(|_| ParseError::BadNumber {
            line,
            token: String::from(word),
        })
    }

    fn count(&mut self, expected: &'static str) -> Result<usize, ParseError> {
        self.number(expected).map(|(_, count)| count)
    }

    fn float(&mut self) -> Result<f32, ParseError> {
        let (line, value): (usize, f32) = self.number("number")?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ParseError::BadNumber {
                line,
                token: value.to_string(),
            })
        }
    }

    fn floats<const N: usize>(&mut self) -> Result<[f32; N], ParseError> {
        self.expect(Token::OpenParen, "(")?;
        let mut values = [0.0; N];
        for value in &mut values {
            *value = self.float()?;
        }
        self.expect(Token::CloseParen, ")")?;
        Ok(values)
    }

    fn element_index(&mut self, section: &'static str, expected: usize) -> Result<(), ParseError> {
        let (line, actual): (usize, usize) = self.number("element index")?;
        if actual == expected {
            Ok(())
        } else {
            Err(ParseError::BadElementIndex {
                line,
                section,
                expected,
                actual,
            })
        }
    }

    fn at_block_end(&mut self) -> Result<bool, ParseError> {
        match self.peek()? {
            Some(Token::CloseBrace) => {
                self.peeked = None;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(ParseError::UnexpectedEof { expected: "}" }),
        }
    }

    fn parse_joints(&mut self) -> Result<Vec<Joint>, ParseError> {
        self.expect(Token::OpenBrace, "{")?;
        let mut joints = Vec::new();
        while !self.at_block_end()? {
            let name = self.string("joint name")?;
            let (_, parent): (usize, i64) = self.number("parent index")?;
            let parent = parent_index(joints.len(), parent)?;
            let [x, y, z] = self.floats()?;
            let [qx, qy, qz] = self.floats()?;
            joints.push(Joint {
                name,
                parent,
                translation: Vec3::new(x, y, z),
                rotation: unit_quat_from_xyz(qx, qy, qz),
            });
        }
        Ok(joints)
    }

    fn parse_mesh(&mut self) -> Result<Mesh, ParseError> {
        self.expect(Token::OpenBrace, "{")?;
        let mut texture = None;
        let (mut vertex_count, mut triangle_count, mut weight_count) = (None, None, None);
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        let mut weights = Vec::new();
        while !self.at_block_end()? {
            let (line, word) = self.word("mesh entry")?;
            match word {
                "shader" => texture = Some(self.string("texture path")?),
                "numverts" => vertex_count = Some(self.count("vertex count")?),
                "numtris" => triangle_count = Some(self.count("triangle count")?),
                "numweights" => weight_count = Some(self.count("weight count")?),
                "vert" => {
                    self.element_index("vert", vertices.len())?;
                    let [u, v] = self.floats()?;
                    let weight_start = self.count("weight start")?;
                    let weight_count = self.count("weight count")?;
                    vertices.push(Vertex {
                        tex_coord: Vec2::new(u, v),
                        weight_start,
                        weight_count,
                    });
                }
                "tri" => {
                    self.element_index("tri", triangles.len())?;
                    let v0 = self.count("vertex index")?;
                    let v1 = self.count("vertex index")?;
                    let v2 = self.count("vertex index")?;
                    triangles.push(Triangle([v0, v1, v2]));
                }
                "weight" => {
                    self.element_index("weight", weights.len())?;
                    let joint = self.count("joint index")?;
                    let bias = self.float()?;
                    let [x, y, z] = self.floats()?;
                    weights.push(Weight {
                        joint,
                        bias,
                        offset: Vec3::new(x, y, z),
                    });
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        line,
                        expected: "mesh entry",
                        found: String::from(other),
                    })
                }
            }
        }

        let vertex_count = vertex_count.ok_or(ParseError::MissingField("numverts"))?;
        check_count("vertices", vertex_count, vertices.len())?;
        let triangle_count = triangle_count.ok_or(ParseError::MissingField("numtris"))?;
        check_count("triangles", triangle_count, triangles.len())?;
        let weight_count = weight_count.ok_or(ParseError::MissingField("numweights"))?;
        check_count("weights", weight_count, weights.len())?;
        Ok(Mesh {
            texture: texture.ok_or(ParseError::MissingField("shader"))?,
            vertices,
            weights,
            triangles,
        })
    }

    fn parse_clip(&mut self) -> Result<AnimationClip, ParseError> {
        let name = self.string("animation name")?;
        self.expect(Token::OpenBrace, "{")?;
        let mut flags = AnimationFlags::default();
        let mut frames = None;
        let mut fps = None;
        let mut keys = HashMap::new();
        while !self.at_block_end()? {
            let (line, word) = self.word("animation entry")?;
            match word {
                "flags" => {
                    let (_, bits) = self.number("flags")?;
                    flags = AnimationFlags::from_bits(bits);
                }
                "frames" => frames = Some(self.count("frame count")?),
                "fps" => fps = Some(self.float()?),
                "key" => {
                    let frame = self.count("frame index")?;
                    let joint = self.count("joint index")?;
                    let key = self.parse_key()?;
                    keys.insert((frame, joint), key);
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        line,
                        expected: "animation entry",
                        found: String::from(other),
                    })
                }
            }
        }
        Ok(AnimationClip {
            name,
            flags,
            frames: frames.ok_or(ParseError::MissingField("frames"))?,
            fps: fps.ok_or(ParseError::MissingField("fps"))?,
            keys,
        })
    }

    fn parse_key(&mut self) -> Result<AnimationKey, ParseError> {
        let mut key = AnimationKey::default();
        loop {
            let part = match self.peek()? {
                Some(Token::Word(part @ ("pos" | "scale" | "rot"))) => *part,
                _ => break,
            };
            self.peeked = None;
            match part {
                "pos" => key.translation = Some(Vec3::from_array(self.floats()?)),
                "scale" => key.scale = Some(Vec3::from_array(self.floats()?)),
                _ => key.rotation = Some(unit_rotation(self.floats()?)?),
            }
        }
        Ok(key)
    }

    fn parse_model(&mut self) -> Result<AssetModel, ParseError> {
        self.keyword("MD5Version")?;
        let (_, version): (usize, i64) = self.number("version")?;
        if version != SUPPORTED_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }

        let (mut joint_count, mut mesh_count, mut clip_count) = (None, None, None);
        let mut joints = None;
        let mut meshes = Vec::new();
        let mut clips = Vec::new();
        while self.peek()?.is_some() {
            let (line, word) = self.word("section")?;
            match word {
                "commandline" => {
                    self.string("command line")?;
                }
                "numJoints" => joint_count = Some(self.count("joint count")?),
                "numMeshes" => mesh_count = Some(self.count("mesh count")?),
                "numAnims" => clip_count = Some(self.count("animation count")?),
                "joints" => joints = Some(self.parse_joints()?),
                "mesh" => meshes.push(self.parse_mesh()?),
                "anim" => clips.push(self.parse_clip()?),
                other => {
                    return Err(ParseError::UnexpectedToken {
                        line,
                        expected: "section",
                        found: String::from(other),
                    })
                }
            }
        }

        let joints = joints.unwrap_or_default();
        let joint_count = joint_count.ok_or(ParseError::MissingField("numJoints"))?;
        check_count("joints", joint_count, joints.len())?;
        let mesh_count = mesh_count.ok_or(ParseError::MissingField("numMeshes"))?;
        check_count("meshes", mesh_count, meshes.len())?;
        if let Some(clip_count) = clip_count {
            check_count("animations", clip_count, clips.len())?;
        }
        AssetModel::new(joints, meshes, clips)
    }
}

fn check_count(section: &'static str, declared: usize, actual: usize) -> Result<(), ParseError> {
    if declared == actual {
        Ok(())
    } else {
        Err(ParseError::CountMismatch {
            section,
            declared,
            actual,
        })
    }
}

pub fn parse(source: &str) -> Result<AssetModel, ParseError> {
    TextParser::new(source).parse_model()
}
