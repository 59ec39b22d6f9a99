/// Nimbus tests
///
/// Austin Shafer - 2025
use crate as nim;
use nim::lexer::{Lexer, Token, TokenTag};
use nim::{dom, Color, Matrix, ParseError, Vector};

use niebla as nb;
use squall as sq;

/// Lex a full document into a vector for inspection
fn lex(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = nb::Arena::with_capacity(nim::scene::MAX_TOKENS);
    Lexer::lex_into(src, &mut tokens)?;
    Ok(tokens.as_slice().to_vec())
}

/// Parse a document into a fresh scene
fn load(src: &str) -> Result<nim::Scene, ParseError> {
    let mut scene = nim::Scene::new();
    scene.load_str(src)?;
    Ok(scene)
}

/// A desktop wrapper for documents that only vary in their nodes
fn desktop_doc(nodes: &str) -> String {
    format!(
        "root {{ desktop {{ size (1024, 768) background (20, 20, 28, 255) nodes [ {} ] }} system {{ }} }}",
        nodes
    )
}

// ------------ lexer -------------

#[test]
fn lex_keywords_and_punctuation() {
    let tokens = lex("root { desktop nodes [ rect text transform ] }").unwrap();
    let tags: Vec<TokenTag> = tokens.iter().map(|t| t.tag).collect();
    assert_eq!(
        tags,
        vec![
            TokenTag::Root,
            TokenTag::LBrace,
            TokenTag::Desktop,
            TokenTag::Nodes,
            TokenTag::LBracket,
            TokenTag::Rect,
            TokenTag::Text,
            TokenTag::Transform,
            TokenTag::RBracket,
            TokenTag::RBrace,
            TokenTag::Eof,
        ]
    );
}

#[test]
fn lex_numbers() {
    let tokens = lex("12 -7 3.5 -0.25").unwrap();
    assert_eq!(tokens[0].tag, TokenTag::Int);
    assert_eq!(tokens[1].tag, TokenTag::Int);
    assert_eq!(tokens[1].literal, "-7");
    assert_eq!(tokens[2].tag, TokenTag::Float);
    assert_eq!(tokens[3].tag, TokenTag::Float);
    assert_eq!(tokens[3].literal, "-0.25");
}

#[test]
fn lex_lone_minus_is_identifier() {
    let tokens = lex("- foo").unwrap();
    assert_eq!(tokens[0].tag, TokenTag::Identifier);
    assert_eq!(tokens[0].literal, "-");
}

#[test]
fn lex_invalid_numbers() {
    match lex("1.2.3") {
        Err(ParseError::InvalidNumber { .. }) => {}
        other => panic!("expected InvalidNumber, got {:?}", other),
    }
    match lex("12abc") {
        Err(ParseError::InvalidNumber { .. }) => {}
        other => panic!("expected InvalidNumber, got {:?}", other),
    }
}

#[test]
fn lex_strings() {
    let tokens = lex("id \"panel one\"").unwrap();
    assert_eq!(tokens[1].tag, TokenTag::StringLiteral);
    assert_eq!(tokens[1].literal, "panel one");
}

#[test]
fn lex_unterminated_string() {
    match lex("\"no end") {
        Err(ParseError::InvalidString { .. }) => {}
        other => panic!("expected InvalidString, got {:?}", other),
    }
    // A raw newline also terminates lexing with an error
    match lex("\"split\nstring\"") {
        Err(ParseError::InvalidString { .. }) => {}
        other => panic!("expected InvalidString, got {:?}", other),
    }
}

#[test]
fn lex_spans_track_lines() {
    let tokens = lex("root\n  desktop\r\n nodes").unwrap();
    assert_eq!((tokens[0].span.line, tokens[0].span.column), (1, 1));
    assert_eq!((tokens[1].span.line, tokens[1].span.column), (2, 3));
    assert_eq!((tokens[2].span.line, tokens[2].span.column), (3, 2));
}

/// Token literals plus the skipped whitespace reproduce the source
#[test]
fn lex_round_trip() {
    let src = "root {\n  desktop { size (64, 64)\r\n nodes [ ] }\n system { }\n}";
    let tokens = lex(src).unwrap();

    let mut cursor = 0;
    for token in tokens.iter() {
        if token.tag == TokenTag::Eof {
            break;
        }
        // Everything between tokens must be whitespace
        assert!(src[cursor..token.span.offset]
            .bytes()
            .all(|b| b == b' ' || b == b'\t' || b == b'\r' || b == b'\n'));

        // String literals sit one byte past their opening quote
        let literal_start = match token.tag {
            TokenTag::StringLiteral => token.span.offset + 1,
            _ => token.span.offset,
        };
        assert_eq!(
            &src[literal_start..literal_start + token.literal.len()],
            token.literal
        );
        cursor = literal_start + token.literal.len();
        if token.tag == TokenTag::StringLiteral {
            cursor += 1;
        }
    }
    assert!(src[cursor..].bytes().all(|b| b.is_ascii_whitespace()));
}

// ------------ parser -------------

#[test]
fn parse_minimal_document() {
    let scene = load(
        "root {
          desktop {
            size (1024, 768)
            background (20, 20, 28, 255)
            nodes [
              rect { id \"panel\" size (200, 100) position (10, 10) background (128, 64, 255, 255) }
            ]
          }
          system { }
        }",
    )
    .unwrap();

    let desktop = scene.desktop().unwrap();
    assert_eq!(desktop.size, Vector::new(1024, 768));
    assert_eq!(desktop.background, Some(Color::new(20, 20, 28, 255)));
    assert_eq!(desktop.nodes.len(), 1);

    match scene.node(desktop.nodes[0]) {
        nim::Node::Rect(rect) => {
            assert_eq!(rect.node_id, 1);
            assert_eq!(rect.id.as_deref(), Some("panel"));
            assert_eq!(rect.size, Vector::new(200, 100));
            assert_eq!(rect.position, Vector::new(10, 10));
            assert_eq!(rect.local_position, Vector::new(0, 0));
            assert_eq!(rect.background, Some(Color::new(128, 64, 255, 255)));
        }
        other => panic!("expected a rect, got {:?}", other),
    }
}

/// Identical input produces identical ids, spans and structure
#[test]
fn parse_determinism() {
    let src = desktop_doc(
        "rect { size (32, 32) position (1, 2) nodes [ text { position (0, 0) text_size 12 body \"x\" } ] }",
    );

    let a = load(&src).unwrap();
    let b = load(&src).unwrap();
    assert_eq!(a.root(), b.root());
    assert_eq!(a.node_count(), b.node_count());
    for i in 0..a.node_count() {
        assert_eq!(a.node(i), b.node(i));
    }

    assert_eq!(lex(&src).unwrap(), lex(&src).unwrap());
}

#[test]
fn parse_missing_property() {
    // A rect without a size is unusable
    match load(&desktop_doc("rect { position (0, 0) }")) {
        Err(ParseError::MissingProperty { property: "size", .. }) => {}
        other => panic!("expected MissingProperty, got {:?}", other),
    }

    // Text requires both position and text_size
    match load(&desktop_doc("text { position (0, 0) body \"hi\" }")) {
        Err(ParseError::MissingProperty {
            property: "text_size",
            ..
        }) => {}
        other => panic!("expected MissingProperty, got {:?}", other),
    }
}

#[test]
fn parse_duplicate_property() {
    match load(&desktop_doc("rect { size (8, 8) size (9, 9) position (0, 0) }")) {
        Err(ParseError::DuplicateProperty { property: "size", .. }) => {}
        other => panic!("expected DuplicateProperty, got {:?}", other),
    }
}

#[test]
fn parse_duplicate_desktop() {
    match load("root { desktop { size (8, 8) } desktop { size (8, 8) } system { } }") {
        Err(ParseError::DuplicateNode { node: "desktop", .. }) => {}
        other => panic!("expected DuplicateNode, got {:?}", other),
    }
}

#[test]
fn parse_missing_system() {
    match load("root { desktop { size (8, 8) } }") {
        Err(ParseError::MissingRequiredNode { node: "system" }) => {}
        other => panic!("expected MissingRequiredNode, got {:?}", other),
    }
}

#[test]
fn parse_invalid_size() {
    match load(&desktop_doc("rect { size (0, 8) position (0, 0) }")) {
        Err(ParseError::InvalidSize { .. }) => {}
        other => panic!("expected InvalidSize, got {:?}", other),
    }
}

#[test]
fn parse_position_must_precede_nodes() {
    match load(&desktop_doc("rect { size (8, 8) nodes [ ] position (0, 0) }")) {
        Err(ParseError::InvalidPosition { .. }) => {}
        other => panic!("expected InvalidPosition, got {:?}", other),
    }
}

#[test]
fn parse_matrix_arity() {
    match load(&desktop_doc("transform { position (0, 0) matrix (1, 0, 0, 1) }")) {
        Err(ParseError::InvalidMatrix { .. }) => {}
        other => panic!("expected InvalidMatrix, got {:?}", other),
    }

    // A trailing comma before the paren is fine
    let scene = load(&desktop_doc(
        "transform { position (0, 0) matrix (1, 0, 0, 1, 4.5, -2,) }",
    ))
    .unwrap();
    match scene.node(scene.desktop().unwrap().nodes[0]) {
        nim::Node::Transform(t) => {
            assert_eq!(t.matrix, Some(Matrix::new(1.0, 0.0, 0.0, 1.0, 4.5, -2.0)));
        }
        other => panic!("expected a transform, got {:?}", other),
    }
}

#[test]
fn parse_invalid_text_size() {
    match load(&desktop_doc("text { position (0, 0) text_size 0 }")) {
        Err(ParseError::InvalidTextSize { .. }) => {}
        other => panic!("expected InvalidTextSize, got {:?}", other),
    }
}

#[test]
fn parse_duplicate_declared_id() {
    match load(&desktop_doc(
        "rect { id \"a\" size (8, 8) position (0, 0) } rect { id \"a\" size (8, 8) position (0, 0) }",
    )) {
        Err(ParseError::DuplicateId { .. }) => {}
        other => panic!("expected DuplicateId, got {:?}", other),
    }
}

#[test]
fn parse_recovers_from_unknown_tokens() {
    // An unknown property is logged and skipped, the rect survives
    let scene = load(&desktop_doc(
        "rect { shimmer size (8, 8) position (0, 0) }",
    ))
    .unwrap();
    assert_eq!(scene.desktop().unwrap().nodes.len(), 1);

    // Clip nodes are not part of the core scene model yet
    let scene = load(&desktop_doc(
        "clip { surface_rect (0, 0) } rect { size (8, 8) position (0, 0) }",
    ))
    .unwrap();
    assert_eq!(scene.desktop().unwrap().nodes.len(), 1);
}

/// No node id may appear in two children lists (tree purity)
#[test]
fn parse_tree_purity() {
    let scene = load(&desktop_doc(
        "rect { size (64, 64) position (0, 0) nodes [
            rect { size (8, 8) position (1, 1) }
            rect { size (8, 8) position (2, 2) }
         ] }
         rect { size (16, 16) position (100, 0) }",
    ))
    .unwrap();

    let desktop = scene.desktop().unwrap();
    // The nested children must not be desktop roots
    assert_eq!(desktop.nodes.len(), 2);

    let mut seen = std::collections::HashSet::new();
    for i in 0..scene.node_count() {
        for child in scene.node(i).children() {
            let id = scene.node(*child).node_id();
            assert!(seen.insert(id), "node {} has two parents", id);
        }
    }
}

#[test]
fn parse_workspaces_and_apps() {
    let scene = load(
        "root {
          desktop {
            size (640, 480)
            workspaces [
              { app { id \"term\" size (320, 240) position (10, 10) background (0, 0, 0, 255)
                      nodes [ rect { id \"cursor\" size (8, 16) position (4, 4) } ] } }
              { }
            ]
          }
          system {
            app { id \"bar\" size (640, 24) position (0, 0) background (32, 32, 32, 255) }
          }
        }",
    )
    .unwrap();

    let root = scene.root().unwrap();
    assert_eq!(root.desktop.workspaces.len(), 2);
    assert_eq!(root.desktop.active_workspace, Some(0));
    assert_eq!(root.desktop.workspaces[0].apps.len(), 1);
    assert_eq!(root.desktop.workspaces[1].apps.len(), 0);
    assert_eq!(root.system.apps.len(), 1);

    let term = scene.find_app("term").unwrap();
    assert_eq!(term.children.len(), 1);
    // App children accumulate locals from the app's position
    assert_eq!(
        scene.node(term.children[0]).local_position(),
        Vector::new(10, 10)
    );

    // The declared id resolves through its stable hash
    let cursor = scene.lookup_declared("cursor").unwrap();
    assert!(scene.app_owns(term, cursor));
}

#[test]
fn parse_app_requires_id() {
    match load(
        "root { desktop { size (64, 64) workspaces [ { app { size (8, 8) position (0, 0) background (0, 0, 0, 255) } } ] } system { } }",
    ) {
        Err(ParseError::MissingProperty { property: "id", .. }) => {}
        other => panic!("expected MissingProperty, got {:?}", other),
    }
}

/// world(N) = local_position(N) + position(N) = world(P) + position(N)
#[test]
fn coordinate_additivity() {
    let scene = load(&desktop_doc(
        "rect { size (64, 64) position (10, 10) nodes [
            rect { size (16, 16) position (3, 4) nodes [
              rect { size (4, 4) position (1, 1) }
            ] }
         ] }",
    ))
    .unwrap();

    let desktop = scene.desktop().unwrap();
    let outer = desktop.nodes[0];
    let mid = scene.node(outer).children()[0];
    let inner = scene.node(mid).children()[0];

    assert_eq!(scene.world_position(outer), Vector::new(10, 10));
    assert_eq!(
        scene.world_position(mid),
        scene.world_position(outer) + scene.node(mid).position()
    );
    assert_eq!(scene.world_position(mid), Vector::new(13, 14));
    assert_eq!(
        scene.world_position(inner),
        scene.world_position(mid) + scene.node(inner).position()
    );
    assert_eq!(scene.world_position(inner), Vector::new(14, 15));
}

// ------------ lowering -------------

/// S1: an empty desktop lowers to nothing
#[test]
fn lower_empty_desktop() {
    let mut scene =
        load("root { desktop { size (64, 64) background (0, 0, 0, 255) nodes [] } system {} }")
            .unwrap();

    let mut ir = sq::IRBuffer::new();
    nim::lower_desktop(&scene, scene.desktop().unwrap(), &mut ir).unwrap();
    assert_eq!(ir.frame_number(), 1);
    assert_eq!(ir.instructions().len(), 0);

    let mut sched = sq::TileScheduler::new();
    sched.schedule(&ir, 64, 64).unwrap();
    assert_eq!(sched.stats().tile_count, 0);

    // And the full pipeline agrees
    let mut renderer = nim::Renderer::new(sq::HeadlessBackend::new());
    let result = renderer.render_desktop(&mut scene).unwrap();
    assert_eq!(result.tiles_rendered, 0);
}

/// S2: one tile-aligned rect is one solid tile
#[test]
fn lower_single_aligned_tile() {
    let scene = load(&desktop_doc(
        "rect { size (16, 16) position (0, 0) background (255, 0, 0, 255) }",
    ))
    .unwrap();

    let mut ir = sq::IRBuffer::new();
    nim::lower_desktop(&scene, scene.desktop().unwrap(), &mut ir).unwrap();
    assert_eq!(ir.instructions().len(), 1);

    let mut sched = sq::TileScheduler::new();
    sched.schedule(&ir, 1024, 768).unwrap();
    let snap = sched.build_snapshot(&ir);
    assert_eq!(snap.tile_work.len(), 1);
    assert_eq!(snap.tile_work[0].coord, sq::TileCoord::new(0, 0));
    assert_eq!(snap.tile_work[0].classification, sq::TileClass::Solid);
    assert_eq!(snap.paint_table.len(), 1);
}

/// S4: opaque overdraw merges down to a single rect's tile set
#[test]
fn lower_opaque_overdraw() {
    let single = load(&desktop_doc(
        "rect { size (32, 32) position (0, 0) background (255, 0, 0, 255) }",
    ))
    .unwrap();
    let doubled = load(&desktop_doc(
        "rect { size (32, 32) position (0, 0) background (255, 0, 0, 255) }
         rect { size (32, 32) position (0, 0) background (255, 0, 0, 255) }",
    ))
    .unwrap();

    let mut sched = sq::TileScheduler::new();
    let mut ir = sq::IRBuffer::new();

    nim::lower_desktop(&single, single.desktop().unwrap(), &mut ir).unwrap();
    sched.schedule(&ir, 64, 64).unwrap();
    let single_tiles = sched.stats().tile_count;

    nim::lower_desktop(&doubled, doubled.desktop().unwrap(), &mut ir).unwrap();
    sched.schedule(&ir, 64, 64).unwrap();
    assert_eq!(sched.stats().tile_count, single_tiles);
}

/// S5: nested coordinates land where the parse accumulated them
#[test]
fn lower_nested_coordinates() {
    let scene = load(&desktop_doc(
        "rect { size (64, 64) position (10, 10) background (1, 2, 3, 255) nodes [
            rect { size (5, 5) position (3, 4) background (0, 255, 0, 255) }
         ] }",
    ))
    .unwrap();

    let mut ir = sq::IRBuffer::new();
    nim::lower_desktop(&scene, scene.desktop().unwrap(), &mut ir).unwrap();

    match ir.instructions()[1] {
        sq::IRInstruction::DrawRect { bounds, .. } => {
            assert_eq!(bounds, nim::Bounds::new(13, 14, 5, 5));
        }
        other => panic!("expected DrawRect, got {:?}", other),
    }
}

/// S6: a transform brackets its children in push/pop state
#[test]
fn lower_transform_passthrough() {
    let scene = load(&desktop_doc(
        "transform { position (0, 0) matrix (1, 0, 0, 1, 0, 0) nodes [
            rect { size (16, 16) position (0, 0) background (255, 0, 0, 255) }
         ] }",
    ))
    .unwrap();

    let mut ir = sq::IRBuffer::new();
    nim::lower_desktop(&scene, scene.desktop().unwrap(), &mut ir).unwrap();

    let insts = ir.instructions();
    assert_eq!(insts.len(), 4);
    assert!(matches!(insts[0], sq::IRInstruction::PushState));
    assert!(matches!(insts[1], sq::IRInstruction::SetTransform { .. }));
    assert!(matches!(insts[2], sq::IRInstruction::DrawRect { .. }));
    assert!(matches!(insts[3], sq::IRInstruction::PopState));
    assert_eq!(ir.state_depth(), 0);
    assert_eq!(ir.clip_depth(), 0);
}

/// A transform without a matrix emits nothing of its own
#[test]
fn lower_matrixless_transform() {
    let scene = load(&desktop_doc(
        "transform { position (8, 8) nodes [
            rect { size (16, 16) position (0, 0) background (255, 0, 0, 255) }
         ] }",
    ))
    .unwrap();

    let mut ir = sq::IRBuffer::new();
    nim::lower_desktop(&scene, scene.desktop().unwrap(), &mut ir).unwrap();

    let insts = ir.instructions();
    assert_eq!(insts.len(), 1);
    match insts[0] {
        sq::IRInstruction::DrawRect { bounds, .. } => {
            assert_eq!(bounds, nim::Bounds::new(8, 8, 16, 16));
        }
        other => panic!("expected DrawRect, got {:?}", other),
    }
}

/// Every backgrounded rect gets exactly one draw_rect, every text
/// one draw_text, in lowering order
#[test]
fn lower_ir_completeness() {
    let scene = load(&desktop_doc(
        "rect { size (16, 16) position (0, 0) background (255, 0, 0, 255) nodes [
            rect { size (8, 8) position (1, 1) }
            text { position (2, 2) text_size 12 body \"hi\" color (255, 255, 255, 255) }
         ] }
         rect { size (16, 16) position (32, 0) background (0, 255, 0, 255) }",
    ))
    .unwrap();

    let mut ir = sq::IRBuffer::new();
    nim::lower_desktop(&scene, scene.desktop().unwrap(), &mut ir).unwrap();

    // The backgroundless rect draws nothing, its siblings still do
    let insts = ir.instructions();
    assert_eq!(insts.len(), 3);
    assert!(matches!(insts[0], sq::IRInstruction::DrawRect { node_id: 3, .. }));
    assert!(matches!(insts[1], sq::IRInstruction::DrawText { node_id: 2, .. }));
    assert!(matches!(insts[2], sq::IRInstruction::DrawRect { node_id: 4, .. }));
}

#[test]
fn lower_text_bounds_estimate() {
    let scene = load(&desktop_doc(
        "text { position (4, 4) text_size 16 body \"hello\" color (255, 255, 255, 255) }",
    ))
    .unwrap();

    let mut ir = sq::IRBuffer::new();
    nim::lower_desktop(&scene, scene.desktop().unwrap(), &mut ir).unwrap();

    match ir.instructions()[0] {
        sq::IRInstruction::DrawText {
            bounds, text_size, ..
        } => {
            // width = len * text_size / 2
            assert_eq!(bounds, nim::Bounds::new(4, 4, 40, 16));
            assert_eq!(text_size, 16);
        }
        other => panic!("expected DrawText, got {:?}", other),
    }
}

// ------------ patch ops -------------

/// A two-app document for ownership tests
fn patch_doc() -> String {
    "root {
      desktop {
        size (640, 480)
        workspaces [
          { app { id \"term\" size (320, 240) position (0, 0) background (0, 0, 0, 255)
                  nodes [
                    rect { id \"frame\" size (100, 100) position (10, 10) nodes [
                      text { id \"title\" position (2, 2) text_size 12 body \"term\" color (255, 255, 255, 255) }
                    ] }
                    rect { id \"spare\" size (20, 20) position (200, 0) }
                  ] }
            app { id \"clock\" size (64, 16) position (320, 0) background (0, 0, 0, 255)
                  nodes [ text { id \"face\" position (0, 0) text_size 12 body \"12:00\" color (255, 255, 255, 255) } ] } }
        ]
      }
      system { }
    }"
    .to_string()
}

#[test]
fn patch_set_position_shifts_subtree() {
    let mut scene = load(&patch_doc()).unwrap();
    let frame = scene.lookup_declared("frame").unwrap();
    let title = scene.lookup_declared("title").unwrap();

    let result = scene
        .apply_patch_batch(
            "term",
            &nim::PatchConfig::default(),
            &[nim::PatchOp::SetPosition {
                node: frame,
                position: Vector::new(50, 60),
            }],
        )
        .unwrap();
    assert_eq!(result.applied, 1);
    assert!(result.rejected.is_empty());

    let frame_index = scene.lookup(frame).unwrap();
    let title_index = scene.lookup(title).unwrap();
    assert_eq!(scene.world_position(frame_index), Vector::new(50, 60));
    // The child's pre-accumulated local follows the move
    assert_eq!(
        scene.world_position(title_index),
        scene.world_position(frame_index) + scene.node(title_index).position()
    );
}

#[test]
fn patch_rejects_cross_app() {
    let mut scene = load(&patch_doc()).unwrap();
    let face = scene.lookup_declared("face").unwrap();
    let frame = scene.lookup_declared("frame").unwrap();

    // term reaches for clock's node: rejected, batch continues
    let result = scene
        .apply_patch_batch(
            "term",
            &nim::PatchConfig::default(),
            &[
                nim::PatchOp::SetText {
                    node: face,
                    body: "13:00".to_string(),
                },
                nim::PatchOp::SetPosition {
                    node: frame,
                    position: Vector::new(1, 1),
                },
            ],
        )
        .unwrap();

    assert_eq!(result.applied, 1);
    assert_eq!(result.rejected.len(), 1);
    match &result.rejected[0] {
        (0, nim::PatchError::CrossAppMutation { node, .. }) => assert_eq!(*node, face),
        other => panic!("expected CrossAppMutation, got {:?}", other),
    }

    // The clock text is untouched
    let face_index = scene.lookup(face).unwrap();
    match scene.node(face_index) {
        nim::Node::Text(text) => assert_eq!(text.body, "12:00"),
        other => panic!("expected text, got {:?}", other),
    }
}

#[test]
fn patch_rejects_unknown_node() {
    let mut scene = load(&patch_doc()).unwrap();

    let result = scene
        .apply_patch_batch(
            "term",
            &nim::PatchConfig::default(),
            &[nim::PatchOp::RemoveNode { node: 9999 }],
        )
        .unwrap();
    assert_eq!(result.applied, 0);
    match &result.rejected[0] {
        (0, nim::PatchError::UnknownNode(9999)) => {}
        other => panic!("expected UnknownNode, got {:?}", other),
    }
}

#[test]
fn patch_rejects_cycles() {
    let mut scene = load(&patch_doc()).unwrap();
    let frame = scene.lookup_declared("frame").unwrap();
    let spare = scene.lookup_declared("spare").unwrap();

    // spare under frame is fine, frame under spare would then cycle
    let result = scene
        .apply_patch_batch(
            "term",
            &nim::PatchConfig::default(),
            &[
                nim::PatchOp::InsertChild {
                    parent: frame,
                    child: spare,
                },
                nim::PatchOp::InsertChild {
                    parent: spare,
                    child: frame,
                },
            ],
        )
        .unwrap();

    assert_eq!(result.applied, 1);
    assert_eq!(result.rejected.len(), 1);
    match &result.rejected[0] {
        (1, nim::PatchError::StructuralCycle { .. }) => {}
        other => panic!("expected StructuralCycle, got {:?}", other),
    }
}

#[test]
fn patch_insert_reaccumulates_locals() {
    let mut scene = load(&patch_doc()).unwrap();
    let frame = scene.lookup_declared("frame").unwrap();
    let spare = scene.lookup_declared("spare").unwrap();

    scene
        .apply_patch_batch(
            "term",
            &nim::PatchConfig::default(),
            &[nim::PatchOp::InsertChild {
                parent: frame,
                child: spare,
            }],
        )
        .unwrap();

    let frame_index = scene.lookup(frame).unwrap();
    let spare_index = scene.lookup(spare).unwrap();
    assert!(scene.node(frame_index).children().contains(&spare_index));
    assert_eq!(
        scene.node(spare_index).local_position(),
        scene.world_position(frame_index)
    );
}

#[test]
fn patch_remove_unlinks() {
    let mut scene = load(&patch_doc()).unwrap();
    let title = scene.lookup_declared("title").unwrap();
    let frame = scene.lookup_declared("frame").unwrap();

    scene
        .apply_patch_batch(
            "term",
            &nim::PatchConfig::default(),
            &[nim::PatchOp::RemoveNode { node: title }],
        )
        .unwrap();

    let frame_index = scene.lookup(frame).unwrap();
    assert!(scene.node(frame_index).children().is_empty());
}

#[test]
fn patch_type_checked_targets() {
    let mut scene = load(&patch_doc()).unwrap();
    let title = scene.lookup_declared("title").unwrap();

    // SetBackground only makes sense on a rect
    let result = scene
        .apply_patch_batch(
            "term",
            &nim::PatchConfig::default(),
            &[nim::PatchOp::SetBackground {
                node: title,
                color: Color::new(1, 2, 3, 255),
            }],
        )
        .unwrap();
    match &result.rejected[0] {
        (0, nim::PatchError::InvalidTarget(node)) => assert_eq!(*node, title),
        other => panic!("expected InvalidTarget, got {:?}", other),
    }
}

#[test]
fn patch_visibility_hides_from_lowering() {
    let mut scene = load(&desktop_doc(
        "rect { id \"a\" size (16, 16) position (0, 0) background (255, 0, 0, 255) }",
    ))
    .unwrap();
    let a = scene.lookup_declared("a").unwrap();
    scene.set_visibility(a, false);

    let mut ir = sq::IRBuffer::new();
    nim::lower_desktop(&scene, scene.desktop().unwrap(), &mut ir).unwrap();
    assert_eq!(ir.instructions().len(), 0);
}

#[test]
fn patch_focus_ops() {
    let mut scene = load(&patch_doc()).unwrap();
    let frame = scene.lookup_declared("frame").unwrap();

    scene
        .apply_patch_batch(
            "term",
            &nim::PatchConfig::default(),
            &[nim::PatchOp::RequestFocus { node: frame }],
        )
        .unwrap();
    assert_eq!(scene.focus(), Some(frame));

    scene
        .apply_patch_batch("term", &nim::PatchConfig::default(), &[nim::PatchOp::ClearFocus])
        .unwrap();
    assert_eq!(scene.focus(), None);
}

#[test]
fn patch_hard_fail_escalation() {
    let mut nimbus = nim::Nimbus::new(sq::HeadlessBackend::new());
    nimbus.load_str(&patch_doc()).unwrap();
    nimbus.set_patch_config(nim::PatchConfig {
        hard_fail_threshold: 2,
    });
    nimbus.pump_events();

    // First violation: soft-failed, session continues
    let result = nimbus
        .apply_patch_batch("term", &[nim::PatchOp::RemoveNode { node: 9999 }])
        .unwrap();
    assert_eq!(result.rejected.len(), 1);

    // Second violation crosses the threshold and terminates
    match nimbus.apply_patch_batch("term", &[nim::PatchOp::RemoveNode { node: 9999 }]) {
        Err(nim::PatchError::SessionTerminated(2)) => {}
        other => panic!("expected SessionTerminated, got {:?}", other),
    }

    let events = nimbus.pump_events();
    assert!(events.contains(&nim::Event::AppClosed {
        id: "term".to_string()
    }));
}

// ------------ the full loop -------------

#[test]
fn host_loop() {
    let mut nimbus = nim::Nimbus::new(sq::HeadlessBackend::new());
    nimbus
        .load_str(&desktop_doc(
            "rect { id \"panel\" size (200, 100) position (10, 10) background (128, 64, 255, 255) }",
        ))
        .unwrap();

    // Loading queues the initial resize
    let events = nimbus.pump_events();
    assert_eq!(
        events,
        vec![nim::Event::WindowResized {
            size: Vector::new(1024, 768)
        }]
    );

    let result = nimbus.render_frame().unwrap();
    assert!(result.tiles_rendered > 0);
    assert!(result.draw_calls > 0);

    let events = nimbus.pump_events();
    assert_eq!(events, vec![nim::Event::WindowRedrawComplete]);

    // A second frame bumps the frame counter, not the scene
    let again = nimbus.render_frame().unwrap();
    assert_eq!(again.tiles_rendered, result.tiles_rendered);
}

#[test]
fn patch_close_requested_event() {
    let mut nimbus = nim::Nimbus::new(sq::HeadlessBackend::new());
    nimbus.load_str(&patch_doc()).unwrap();
    nimbus.pump_events();

    let result = nimbus
        .apply_patch_batch("clock", &[nim::PatchOp::RequestClose])
        .unwrap();
    assert!(result.close_requested);

    let events = nimbus.pump_events();
    assert!(events.contains(&nim::Event::AppClosed {
        id: "clock".to_string()
    }));
}

// ------------ dom helpers -------------

#[test]
fn stable_id_is_djb2() {
    // djb2 with hash * 33 + byte, seeded at 5381
    let mut expected: u64 = 5381;
    for byte in "panel".bytes() {
        expected = expected.wrapping_mul(33).wrapping_add(byte as u64);
    }
    assert_eq!(dom::stable_id("panel"), expected);
    assert_ne!(dom::stable_id("panel"), dom::stable_id("panel2"));
}

#[test]
fn dirty_marks_flow_to_snapshot() {
    let mut scene = load(&patch_doc()).unwrap();
    let frame = scene.lookup_declared("frame").unwrap();

    scene
        .apply_patch_batch(
            "term",
            &nim::PatchConfig::default(),
            &[nim::PatchOp::SetPosition {
                node: frame,
                position: Vector::new(30, 30),
            }],
        )
        .unwrap();

    // The renderer forwards the damage into the frame snapshot
    let dirty = scene.take_dirty();
    assert!(!dirty.is_empty());
    assert!(dirty.iter().all(|(_, node)| *node == frame));
}
