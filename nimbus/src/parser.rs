/// The swen recursive descent parser
///
/// This walks the token stream with a peek/advance cursor and builds
/// the retained scene tree directly into the caller's node arena.
/// Children are parsed greedily into the flat arena and each node
/// list is root filtered on close, which is what keeps the scene a
/// tree even though storage is flat.
///
/// Austin Shafer - 2025
use crate::dom::{self, Node, NodeId, NodeIndex};
use crate::lexer::{Span, Token, TokenTag};
use crate::scene;
use crate::ParseError;

use niebla as nb;
use utils::log;
use utils::region::{Color, Matrix, Vector};

use std::collections::HashSet;

pub(crate) struct Parser<'t, 'a> {
    p_tokens: &'t [Token<'a>],
    p_pos: usize,
    /// The node id cursor. Every constructed node takes the next id.
    p_next_id: NodeId,
}

impl<'t, 'a> Parser<'t, 'a> {
    /// The token slice must be terminated by an Eof token, which is
    /// what the lexer always produces.
    pub(crate) fn new(tokens: &'t [Token<'a>]) -> Self {
        Self {
            p_tokens: tokens,
            p_pos: 0,
            p_next_id: 1,
        }
    }

    /// The id the next parse would assign, handed back to the scene
    /// so later patch-created state keeps ids unique.
    pub(crate) fn id_cursor(&self) -> NodeId {
        self.p_next_id
    }

    fn peek(&self) -> Token<'a> {
        self.p_tokens[self.p_pos.min(self.p_tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        if self.p_pos < self.p_tokens.len() - 1 {
            self.p_pos += 1;
        }
        token
    }

    fn expect(&mut self, tag: TokenTag, expected: &'static str) -> Result<Token<'a>, ParseError> {
        let token = self.advance();
        if token.tag != tag {
            return Err(ParseError::ExpectedToken {
                expected: expected,
                found: token.literal.to_string(),
                span: token.span,
            });
        }
        Ok(token)
    }

    fn next_node_id(&mut self) -> NodeId {
        let id = self.p_next_id;
        self.p_next_id += 1;
        id
    }

    /// Skip over an unknown construct during recovery
    ///
    /// Consumes one token, plus a balanced brace or bracket block if
    /// one follows. A document that ends mid-block is still fatal.
    fn skip_unknown(&mut self) -> Result<(), ParseError> {
        let token = self.advance();
        log::error!(
            "{}: skipping unknown token '{}'",
            token.span,
            token.literal
        );

        if self.peek().tag == TokenTag::LBrace || self.peek().tag == TokenTag::LBracket {
            let mut depth = 0;
            loop {
                let token = self.advance();
                match token.tag {
                    TokenTag::LBrace | TokenTag::LBracket => depth += 1,
                    TokenTag::RBrace | TokenTag::RBracket => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(());
                        }
                    }
                    TokenTag::Eof => {
                        return Err(ParseError::ExpectedToken {
                            expected: "a closing brace",
                            found: token.literal.to_string(),
                            span: token.span,
                        })
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    /// root := "root" "{" (desktop | system)* "}"
    pub(crate) fn parse_root(&mut self, nodes: &mut nb::Arena<Node>) -> Result<dom::Root, ParseError> {
        self.expect(TokenTag::Root, "root")?;
        self.expect(TokenTag::LBrace, "'{'")?;

        let mut desktop: Option<dom::Desktop> = None;
        let mut system: Option<dom::System> = None;

        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::Desktop => {
                    if desktop.is_some() {
                        return Err(ParseError::DuplicateNode {
                            node: "desktop",
                            span: token.span,
                        });
                    }
                    self.advance();
                    desktop = Some(self.parse_desktop(nodes)?);
                }
                TokenTag::System => {
                    if system.is_some() {
                        return Err(ParseError::DuplicateNode {
                            node: "system",
                            span: token.span,
                        });
                    }
                    self.advance();
                    system = Some(self.parse_system(nodes)?);
                }
                TokenTag::RBrace => {
                    self.advance();
                    break;
                }
                TokenTag::Eof => {
                    return Err(ParseError::ExpectedToken {
                        expected: "'}'",
                        found: token.literal.to_string(),
                        span: token.span,
                    })
                }
                _ => self.skip_unknown()?,
            }
        }

        Ok(dom::Root {
            desktop: desktop.ok_or(ParseError::MissingRequiredNode { node: "desktop" })?,
            system: system.ok_or(ParseError::MissingRequiredNode { node: "system" })?,
        })
    }

    /// desktop := "desktop" "{" desktop-prop* "}"
    fn parse_desktop(&mut self, nodes: &mut nb::Arena<Node>) -> Result<dom::Desktop, ParseError> {
        let open = self.expect(TokenTag::LBrace, "'{'")?;

        let mut size: Option<Vector> = None;
        let mut background: Option<Color> = None;
        let mut workspaces: Option<Vec<dom::Workspace>> = None;
        let mut node_list: Option<Vec<NodeIndex>> = None;
        // The desktop's drawable layer is its own id scope
        let mut declared = HashSet::new();

        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::Size => {
                    self.advance();
                    if size.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "size",
                            span: token.span,
                        });
                    }
                    let vec = self.parse_vector()?;
                    if vec.x <= 0 || vec.y <= 0 {
                        return Err(ParseError::InvalidSize { span: token.span });
                    }
                    size = Some(vec);
                }
                TokenTag::Background => {
                    self.advance();
                    if background.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "background",
                            span: token.span,
                        });
                    }
                    background = Some(self.parse_color()?);
                }
                TokenTag::Workspaces => {
                    self.advance();
                    if workspaces.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "workspaces",
                            span: token.span,
                        });
                    }
                    workspaces = Some(self.parse_workspaces(nodes)?);
                }
                TokenTag::Nodes => {
                    self.advance();
                    if node_list.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "nodes",
                            span: token.span,
                        });
                    }
                    // Desktop children accumulate from the origin
                    node_list = Some(self.parse_node_list(nodes, Vector::new(0, 0), &mut declared)?);
                }
                TokenTag::RBrace => {
                    self.advance();
                    break;
                }
                TokenTag::Eof => {
                    return Err(ParseError::ExpectedToken {
                        expected: "'}'",
                        found: token.literal.to_string(),
                        span: token.span,
                    })
                }
                _ => self.skip_unknown()?,
            }
        }

        let workspaces = workspaces.unwrap_or_default();
        Ok(dom::Desktop {
            size: size.ok_or(ParseError::MissingProperty {
                property: "size",
                span: open.span,
            })?,
            background: background,
            // The first workspace starts out active
            active_workspace: match workspaces.is_empty() {
                true => None,
                false => Some(0),
            },
            workspaces: workspaces,
            nodes: node_list.unwrap_or_default(),
        })
    }

    /// system := "system" "{" app* "}"
    ///
    /// The system layer is structural in the core: apps are kept
    /// reachable but nothing here is lowered. Anything else in the
    /// body is skipped.
    fn parse_system(&mut self, nodes: &mut nb::Arena<Node>) -> Result<dom::System, ParseError> {
        self.expect(TokenTag::LBrace, "'{'")?;

        let mut apps = Vec::new();
        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::App => {
                    self.advance();
                    apps.push(self.parse_app(nodes)?);
                }
                TokenTag::RBrace => {
                    self.advance();
                    return Ok(dom::System { apps: apps });
                }
                TokenTag::Eof => {
                    return Err(ParseError::ExpectedToken {
                        expected: "'}'",
                        found: token.literal.to_string(),
                        span: token.span,
                    })
                }
                _ => self.skip_unknown()?,
            }
        }
    }

    /// workspaces := "workspaces" "[" workspace* "]"
    /// workspace  := "{" app* "}"
    fn parse_workspaces(
        &mut self,
        nodes: &mut nb::Arena<Node>,
    ) -> Result<Vec<dom::Workspace>, ParseError> {
        self.expect(TokenTag::LBracket, "'['")?;

        let mut workspaces = Vec::new();
        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::LBrace => {
                    self.advance();
                    let mut apps = Vec::new();
                    loop {
                        let token = self.peek();
                        match token.tag {
                            TokenTag::App => {
                                self.advance();
                                apps.push(self.parse_app(nodes)?);
                            }
                            TokenTag::RBrace => {
                                self.advance();
                                break;
                            }
                            TokenTag::Eof => {
                                return Err(ParseError::ExpectedToken {
                                    expected: "'}'",
                                    found: token.literal.to_string(),
                                    span: token.span,
                                })
                            }
                            _ => self.skip_unknown()?,
                        }
                    }
                    workspaces.push(dom::Workspace { apps: apps });
                }
                TokenTag::RBracket => {
                    self.advance();
                    return Ok(workspaces);
                }
                TokenTag::Eof => {
                    return Err(ParseError::ExpectedToken {
                        expected: "']'",
                        found: token.literal.to_string(),
                        span: token.span,
                    })
                }
                _ => self.skip_unknown()?,
            }
        }
    }

    /// app := "app" "{" app-prop* "}"
    ///
    /// Every app subtree is its own declared-id scope.
    fn parse_app(&mut self, nodes: &mut nb::Arena<Node>) -> Result<dom::App, ParseError> {
        let open = self.expect(TokenTag::LBrace, "'{'")?;

        let mut id: Option<String> = None;
        let mut size: Option<Vector> = None;
        let mut position: Option<Vector> = None;
        let mut background: Option<Color> = None;
        let mut children: Option<Vec<NodeIndex>> = None;
        let mut declared = HashSet::new();

        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::Id => {
                    self.advance();
                    if id.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "id",
                            span: token.span,
                        });
                    }
                    id = Some(
                        self.expect(TokenTag::StringLiteral, "a string")?
                            .literal
                            .to_string(),
                    );
                }
                TokenTag::Size => {
                    self.advance();
                    if size.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "size",
                            span: token.span,
                        });
                    }
                    let vec = self.parse_vector()?;
                    if vec.x <= 0 || vec.y <= 0 {
                        return Err(ParseError::InvalidSize { span: token.span });
                    }
                    size = Some(vec);
                }
                TokenTag::Position => {
                    self.advance();
                    if position.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "position",
                            span: token.span,
                        });
                    }
                    position = Some(self.parse_vector()?);
                }
                TokenTag::Background => {
                    self.advance();
                    if background.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "background",
                            span: token.span,
                        });
                    }
                    background = Some(self.parse_color()?);
                }
                TokenTag::Nodes => {
                    self.advance();
                    if children.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "nodes",
                            span: token.span,
                        });
                    }
                    let base = position.ok_or(ParseError::InvalidPosition { span: token.span })?;
                    children = Some(self.parse_node_list(nodes, base, &mut declared)?);
                }
                TokenTag::RBrace => {
                    self.advance();
                    break;
                }
                TokenTag::Eof => {
                    return Err(ParseError::ExpectedToken {
                        expected: "'}'",
                        found: token.literal.to_string(),
                        span: token.span,
                    })
                }
                _ => self.skip_unknown()?,
            }
        }

        Ok(dom::App {
            id: id.ok_or(ParseError::MissingProperty {
                property: "id",
                span: open.span,
            })?,
            size: size.ok_or(ParseError::MissingProperty {
                property: "size",
                span: open.span,
            })?,
            position: position.ok_or(ParseError::MissingProperty {
                property: "position",
                span: open.span,
            })?,
            background: background.ok_or(ParseError::MissingProperty {
                property: "background",
                span: open.span,
            })?,
            children: children.unwrap_or_default(),
        })
    }

    /// nodes := "nodes" "[" node* "]"
    ///
    /// Nodes land in the shared arena as they parse. On close the
    /// range covered by this list is root filtered: anything that is
    /// some other node's child is dropped from the list itself.
    fn parse_node_list(
        &mut self,
        nodes: &mut nb::Arena<Node>,
        parent_local: Vector,
        declared: &mut HashSet<String>,
    ) -> Result<Vec<NodeIndex>, ParseError> {
        self.expect(TokenTag::LBracket, "'['")?;
        let range_start = nodes.len();

        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::Rect => {
                    self.advance();
                    self.parse_rect(nodes, parent_local, declared)?;
                }
                TokenTag::Text => {
                    self.advance();
                    self.parse_text(nodes, parent_local, declared)?;
                }
                TokenTag::Transform => {
                    self.advance();
                    self.parse_transform(nodes, parent_local, declared)?;
                }
                TokenTag::RBracket => {
                    self.advance();
                    break;
                }
                TokenTag::Eof => {
                    return Err(ParseError::ExpectedToken {
                        expected: "']'",
                        found: token.literal.to_string(),
                        span: token.span,
                    })
                }
                _ => self.skip_unknown()?,
            }
        }

        scene::root_filter(nodes, range_start)
    }

    /// Register a declared id in the current scope
    fn declare_id(
        &mut self,
        declared: &mut HashSet<String>,
        id: &str,
        span: Span,
    ) -> Result<(), ParseError> {
        if !declared.insert(id.to_string()) {
            return Err(ParseError::DuplicateId {
                id: id.to_string(),
                span: span,
            });
        }
        Ok(())
    }

    /// rect := "rect" "{" rect-prop* "}"
    fn parse_rect(
        &mut self,
        nodes: &mut nb::Arena<Node>,
        parent_local: Vector,
        declared: &mut HashSet<String>,
    ) -> Result<NodeIndex, ParseError> {
        let open = self.expect(TokenTag::LBrace, "'{'")?;

        let mut id: Option<String> = None;
        let mut size: Option<Vector> = None;
        let mut position: Option<Vector> = None;
        let mut background: Option<Color> = None;
        let mut children: Option<Vec<NodeIndex>> = None;

        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::Id => {
                    self.advance();
                    if id.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "id",
                            span: token.span,
                        });
                    }
                    let lit = self.expect(TokenTag::StringLiteral, "a string")?;
                    self.declare_id(declared, lit.literal, lit.span)?;
                    id = Some(lit.literal.to_string());
                }
                TokenTag::Size => {
                    self.advance();
                    if size.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "size",
                            span: token.span,
                        });
                    }
                    let vec = self.parse_vector()?;
                    if vec.x <= 0 || vec.y <= 0 {
                        return Err(ParseError::InvalidSize { span: token.span });
                    }
                    size = Some(vec);
                }
                TokenTag::Position => {
                    self.advance();
                    if position.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "position",
                            span: token.span,
                        });
                    }
                    position = Some(self.parse_vector()?);
                }
                TokenTag::Background => {
                    self.advance();
                    if background.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "background",
                            span: token.span,
                        });
                    }
                    background = Some(self.parse_color()?);
                }
                TokenTag::Nodes => {
                    self.advance();
                    if children.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "nodes",
                            span: token.span,
                        });
                    }
                    // The children's base coordinate comes from this
                    // node's position, which must be known by now
                    let position =
                        position.ok_or(ParseError::InvalidPosition { span: token.span })?;
                    children = Some(self.parse_node_list(nodes, parent_local + position, declared)?);
                }
                TokenTag::RBrace => {
                    self.advance();
                    break;
                }
                TokenTag::Eof => {
                    return Err(ParseError::ExpectedToken {
                        expected: "'}'",
                        found: token.literal.to_string(),
                        span: token.span,
                    })
                }
                _ => self.skip_unknown()?,
            }
        }

        let rect = dom::Rect {
            node_id: self.next_node_id(),
            id: id,
            size: size.ok_or(ParseError::MissingProperty {
                property: "size",
                span: open.span,
            })?,
            position: position.ok_or(ParseError::MissingProperty {
                property: "position",
                span: open.span,
            })?,
            local_position: parent_local,
            background: background,
            children: children.unwrap_or_default(),
        };

        Ok(nodes.push(Node::Rect(rect))?)
    }

    /// text := "text" "{" text-prop* "}"
    fn parse_text(
        &mut self,
        nodes: &mut nb::Arena<Node>,
        parent_local: Vector,
        declared: &mut HashSet<String>,
    ) -> Result<NodeIndex, ParseError> {
        let open = self.expect(TokenTag::LBrace, "'{'")?;

        let mut id: Option<String> = None;
        let mut body: Option<String> = None;
        let mut color: Option<Color> = None;
        let mut position: Option<Vector> = None;
        let mut text_size: Option<u16> = None;

        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::Id => {
                    self.advance();
                    if id.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "id",
                            span: token.span,
                        });
                    }
                    let lit = self.expect(TokenTag::StringLiteral, "a string")?;
                    self.declare_id(declared, lit.literal, lit.span)?;
                    id = Some(lit.literal.to_string());
                }
                TokenTag::Body => {
                    self.advance();
                    if body.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "body",
                            span: token.span,
                        });
                    }
                    body = Some(
                        self.expect(TokenTag::StringLiteral, "a string")?
                            .literal
                            .to_string(),
                    );
                }
                TokenTag::Color => {
                    self.advance();
                    if color.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "color",
                            span: token.span,
                        });
                    }
                    color = Some(self.parse_color()?);
                }
                TokenTag::Position => {
                    self.advance();
                    if position.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "position",
                            span: token.span,
                        });
                    }
                    position = Some(self.parse_vector()?);
                }
                TokenTag::TextSize => {
                    self.advance();
                    if text_size.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "text_size",
                            span: token.span,
                        });
                    }
                    let (value, span) = self.parse_i32()?;
                    if value <= 0 || value > u16::MAX as i32 {
                        return Err(ParseError::InvalidTextSize { span: span });
                    }
                    text_size = Some(value as u16);
                }
                TokenTag::RBrace => {
                    self.advance();
                    break;
                }
                TokenTag::Eof => {
                    return Err(ParseError::ExpectedToken {
                        expected: "'}'",
                        found: token.literal.to_string(),
                        span: token.span,
                    })
                }
                _ => self.skip_unknown()?,
            }
        }

        let text = dom::Text {
            node_id: self.next_node_id(),
            id: id,
            body: body.unwrap_or_default(),
            color: color.unwrap_or(Color::new(255, 255, 255, 255)),
            position: position.ok_or(ParseError::MissingProperty {
                property: "position",
                span: open.span,
            })?,
            local_position: parent_local,
            text_size: text_size.ok_or(ParseError::MissingProperty {
                property: "text_size",
                span: open.span,
            })?,
        };

        Ok(nodes.push(Node::Text(text))?)
    }

    /// transform := "transform" "{" transform-prop* "}"
    fn parse_transform(
        &mut self,
        nodes: &mut nb::Arena<Node>,
        parent_local: Vector,
        declared: &mut HashSet<String>,
    ) -> Result<NodeIndex, ParseError> {
        let open = self.expect(TokenTag::LBrace, "'{'")?;

        let mut id: Option<String> = None;
        let mut position: Option<Vector> = None;
        let mut matrix: Option<Matrix> = None;
        let mut children: Option<Vec<NodeIndex>> = None;

        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::Id => {
                    self.advance();
                    if id.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "id",
                            span: token.span,
                        });
                    }
                    let lit = self.expect(TokenTag::StringLiteral, "a string")?;
                    self.declare_id(declared, lit.literal, lit.span)?;
                    id = Some(lit.literal.to_string());
                }
                TokenTag::Position => {
                    self.advance();
                    if position.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "position",
                            span: token.span,
                        });
                    }
                    position = Some(self.parse_vector()?);
                }
                TokenTag::Matrix => {
                    self.advance();
                    if matrix.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "matrix",
                            span: token.span,
                        });
                    }
                    matrix = Some(self.parse_matrix()?);
                }
                TokenTag::Nodes => {
                    self.advance();
                    if children.is_some() {
                        return Err(ParseError::DuplicateProperty {
                            property: "nodes",
                            span: token.span,
                        });
                    }
                    let position =
                        position.ok_or(ParseError::InvalidPosition { span: token.span })?;
                    children = Some(self.parse_node_list(nodes, parent_local + position, declared)?);
                }
                TokenTag::RBrace => {
                    self.advance();
                    break;
                }
                TokenTag::Eof => {
                    return Err(ParseError::ExpectedToken {
                        expected: "'}'",
                        found: token.literal.to_string(),
                        span: token.span,
                    })
                }
                _ => self.skip_unknown()?,
            }
        }

        let transform = dom::Transform {
            node_id: self.next_node_id(),
            id: id,
            position: position.ok_or(ParseError::MissingProperty {
                property: "position",
                span: open.span,
            })?,
            local_position: parent_local,
            matrix: matrix,
            children: children.unwrap_or_default(),
        };

        Ok(nodes.push(Node::Transform(transform))?)
    }

    /// vector := "(" number "," number ")"
    fn parse_vector(&mut self) -> Result<Vector, ParseError> {
        self.expect(TokenTag::LParen, "'('")?;
        let (x, _) = self.parse_i32()?;
        self.expect(TokenTag::Comma, "','")?;
        let (y, _) = self.parse_i32()?;
        self.expect(TokenTag::RParen, "')'")?;

        Ok(Vector::new(x, y))
    }

    /// color := "(" number "," number "," number "," number ")"
    ///
    /// Channels are 8-bit, anything outside [0, 255] is rejected.
    fn parse_color(&mut self) -> Result<Color, ParseError> {
        self.expect(TokenTag::LParen, "'('")?;

        let mut channels = [0u8; 4];
        for (i, channel) in channels.iter_mut().enumerate() {
            if i > 0 {
                self.expect(TokenTag::Comma, "','")?;
            }
            let (value, span) = self.parse_i32()?;
            if value < 0 || value > 255 {
                return Err(ParseError::ExpectedColor { span: span });
            }
            *channel = value as u8;
        }
        self.expect(TokenTag::RParen, "')'")?;

        Ok(Color::new(channels[0], channels[1], channels[2], channels[3]))
    }

    /// matrix := "(" number ("," number)* ","? ")"
    ///
    /// Exactly six numbers. A trailing comma before the paren is
    /// tolerated.
    fn parse_matrix(&mut self) -> Result<Matrix, ParseError> {
        let open = self.expect(TokenTag::LParen, "'('")?;

        let mut values = [0f32; 6];
        let mut count = 0;
        loop {
            let token = self.peek();
            match token.tag {
                TokenTag::RParen => {
                    self.advance();
                    break;
                }
                TokenTag::Int | TokenTag::Float => {
                    if count >= 6 {
                        return Err(ParseError::InvalidMatrix { span: token.span });
                    }
                    values[count] = self.parse_f32()?;
                    count += 1;

                    // A comma or the closing paren must follow
                    match self.peek().tag {
                        TokenTag::Comma => {
                            self.advance();
                        }
                        TokenTag::RParen => {}
                        _ => {
                            let token = self.peek();
                            return Err(ParseError::ExpectedToken {
                                expected: "',' or ')'",
                                found: token.literal.to_string(),
                                span: token.span,
                            });
                        }
                    }
                }
                _ => return Err(ParseError::InvalidMatrix { span: token.span }),
            }
        }

        if count != 6 {
            return Err(ParseError::InvalidMatrix { span: open.span });
        }

        Ok(Matrix::new(
            values[0], values[1], values[2], values[3], values[4], values[5],
        ))
    }

    fn parse_i32(&mut self) -> Result<(i32, Span), ParseError> {
        let token = self.advance();
        match token.tag {
            TokenTag::Int => match token.literal.parse::<i32>() {
                Ok(value) => Ok((value, token.span)),
                Err(_) => Err(ParseError::InvalidNumber { span: token.span }),
            },
            _ => Err(ParseError::ExpectedToken {
                expected: "an integer",
                found: token.literal.to_string(),
                span: token.span,
            }),
        }
    }

    fn parse_f32(&mut self) -> Result<f32, ParseError> {
        let token = self.advance();
        match token.tag {
            TokenTag::Int | TokenTag::Float => match token.literal.parse::<f32>() {
                Ok(value) => Ok(value),
                Err(_) => Err(ParseError::InvalidNumber { span: token.span }),
            },
            _ => Err(ParseError::ExpectedToken {
                expected: "a number",
                found: token.literal.to_string(),
                span: token.span,
            }),
        }
    }
}
