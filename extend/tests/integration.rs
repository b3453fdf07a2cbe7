use std::path::PathBuf;

use extend::{
    Dependency, ExtendError, ExtendOptions, FsLoader, LoadError, MemoryLoader, Resolver, rewrite,
};
use markup::{Document, Parser};

const LAYOUT: &str = "<html><head><block name=\"head\">head</block></head><body><block name=\"body\">body</block></body></html>";

fn options() -> ExtendOptions {
    ExtendOptions::default().with_root("/site")
}

fn site() -> MemoryLoader {
    MemoryLoader::new().with_file("/site/layout.html", LAYOUT)
}

fn run_with(
    source: &str,
    options: &ExtendOptions,
    loader: &MemoryLoader,
) -> Result<(String, Vec<Dependency>), ExtendError> {
    let document = Parser::new(source, 0).parse().expect("parse failed");
    let resolved = rewrite(document.nodes, "index.html", options, loader)?;
    let dependencies = resolved.dependencies.clone();
    Ok((resolved.into_document().to_string(), dependencies))
}

fn run(source: &str, loader: &MemoryLoader) -> String {
    run_with(source, &options(), loader)
        .expect("rewrite failed")
        .0
}

fn run_err(source: &str, loader: &MemoryLoader) -> String {
    run_with(source, &options(), loader)
        .expect_err("rewrite should fail")
        .to_string()
}

#[test]
fn standalone_block_renders_its_content() {
    assert_eq!(run("<block name=\"X\">content</block>", &site()), "content");
    assert_eq!(
        run("<div><block name=\"a\">1</block><block name=\"b\">2</block></div>", &site()),
        "<div>12</div>"
    );
}

#[test]
fn replace_override_keeps_layout_markup() {
    let out = run(
        "<extends src=\"layout.html\"><block name=\"body\">X</block></extends>",
        &site(),
    );
    assert_eq!(out, "<html><head>head</head><body>X</body></html>");
}

#[test]
fn empty_override_empties_the_block() {
    let out = run(
        "<extends src=\"layout.html\"><block name=\"body\"></block></extends>",
        &site(),
    );
    assert_eq!(out, "<html><head>head</head><body></body></html>");
}

#[test]
fn append_and_prepend() {
    let loader = MemoryLoader::new().with_file("/site/d.html", "<block name=\"x\">D</block>");
    assert_eq!(
        run(
            "<extends src=\"d.html\"><block name=\"x\" type=\"append\">A</block></extends>",
            &loader
        ),
        "DA"
    );
    assert_eq!(
        run(
            "<extends src=\"d.html\"><block name=\"x\" type=\"prepend\">P</block></extends>",
            &loader
        ),
        "PD"
    );
}

#[test]
fn non_block_extends_content_is_discarded() {
    let out = run(
        "<extends src=\"layout.html\">junk<p>x</p><block name=\"body\">X</block><!-- c --></extends>",
        &site(),
    );
    assert_eq!(out, "<html><head>head</head><body>X</body></html>");
}

#[test]
fn host_siblings_are_preserved() {
    let out = run(
        "<!-- top -->\n<extends src=\"layout.html\"></extends>\n<p>after</p>",
        &site(),
    );
    assert_eq!(
        out,
        "<!-- top -->\n<html><head>head</head><body>body</body></html>\n<p>after</p>"
    );
}

#[test]
fn nested_extends_in_host_is_resolved() {
    let loader = MemoryLoader::new().with_file("/site/card.html", "<div class=\"card\"><block name=\"title\">untitled</block></div>");
    let out = run(
        "<section><extends src=\"card.html\"><block name=\"title\">One</block></extends><extends src=\"card.html\"></extends></section>",
        &loader,
    );
    assert_eq!(
        out,
        "<section><div class=\"card\">One</div><div class=\"card\">untitled</div></section>"
    );
}

#[test]
fn three_level_chain() {
    let loader = MemoryLoader::new()
        .with_file(
            "/site/base.html",
            "<title><block name=\"title\">C</block></title><main><block name=\"content\">c</block></main><footer><block name=\"footer\">f</block></footer>",
        )
        .with_file(
            "/site/page.html",
            "<extends src=\"base.html\"><block name=\"content\">B<block name=\"sidebar\">s</block></block><block name=\"footer\" type=\"append\">b</block></extends>",
        );

    let (out, dependencies) = run_with(
        "<extends src=\"page.html\"><block name=\"title\">A</block><block name=\"footer\" type=\"append\">a</block><block name=\"sidebar\">S</block></extends>",
        &options(),
        &loader,
    )
    .expect("rewrite failed");

    assert_eq!(out, "<title>A</title><main>BS</main><footer>fba</footer>");
    assert_eq!(
        dependencies,
        vec![
            Dependency::new("/site/page.html", "index.html"),
            Dependency::new("/site/base.html", "/site/page.html"),
        ]
    );
}

#[test]
fn extends_inside_layout_override_resolves_at_its_level() {
    let loader = MemoryLoader::new()
        .with_file(
            "/site/base.html",
            "<main><block name=\"content\">c</block></main>",
        )
        .with_file(
            "/site/page.html",
            "<extends src=\"base.html\"><block name=\"content\"><extends src=\"card.html\"></extends></block></extends>",
        )
        .with_file(
            "/site/card.html",
            "<h1><block name=\"title\">untitled</block></h1>",
        );

    let (out, dependencies) = run_with(
        "<extends src=\"page.html\"><block name=\"title\">T</block></extends>",
        &options(),
        &loader,
    )
    .expect("rewrite failed");
    assert_eq!(out, "<main><h1>T</h1></main>");
    assert_eq!(
        dependencies,
        vec![
            Dependency::new("/site/page.html", "index.html"),
            Dependency::new("/site/base.html", "/site/page.html"),
            Dependency::new("/site/card.html", "/site/page.html"),
        ]
    );

    assert_eq!(
        run("<extends src=\"page.html\"></extends>", &loader),
        "<main><h1>untitled</h1></main>"
    );
}

#[test]
fn untouched_chain_blocks_keep_defaults() {
    let loader = MemoryLoader::new()
        .with_file("/site/base.html", "[<block name=\"a\">1</block>|<block name=\"b\">2</block>]")
        .with_file(
            "/site/page.html",
            "<extends src=\"base.html\"><block name=\"a\">B</block></extends>",
        );
    assert_eq!(run("<extends src=\"page.html\"></extends>", &loader), "[B|2]");
}

#[test]
fn missing_src() {
    assert_eq!(
        run_err("<extends><block name=\"x\"></block></extends>", &site()),
        "[markup-extend] <extends> has no \"src\""
    );
    assert_eq!(
        run_err("<extends src=\"\"></extends>", &site()),
        "[markup-extend] <extends> has no \"src\""
    );
}

#[test]
fn missing_block_name() {
    let expected = "[markup-extend] <block> has no \"name\"";
    assert_eq!(run_err("<block>x</block>", &site()), expected);
    assert_eq!(
        run_err("<extends src=\"layout.html\"><block>x</block></extends>", &site()),
        expected
    );

    let loader = MemoryLoader::new().with_file("/site/bad.html", "<p><block>x</block></p>");
    assert_eq!(run_err("<extends src=\"bad.html\"></extends>", &loader), expected);

    assert_eq!(
        run_err(
            "<extends src=\"layout.html\"><div><block>x</block></div></extends>",
            &site()
        ),
        expected
    );
}

#[test]
fn unexpected_block() {
    assert_eq!(
        run_err(
            "<extends src=\"layout.html\"><block name=\"sidebar\">x</block></extends>",
            &site()
        ),
        "[markup-extend] Unexpected block \"sidebar\""
    );
}

#[test]
fn lenient_mode_skips_unknown_blocks() {
    let (out, _) = run_with(
        "<extends src=\"layout.html\"><block name=\"sidebar\">x</block><block name=\"body\">X</block></extends>",
        &options().with_strict(false),
        &site(),
    )
    .expect("rewrite failed");
    assert_eq!(out, "<html><head>head</head><body>X</body></html>");
}

#[test]
fn first_dependency_is_the_layout() {
    let (_, dependencies) = run_with(
        "<extends src=\"layout.html\"></extends>",
        &options(),
        &site(),
    )
    .expect("rewrite failed");
    assert_eq!(
        dependencies.first(),
        Some(&Dependency::new("/site/layout.html", "index.html"))
    );
}

#[test]
fn rewriting_resolved_output_is_a_no_op() {
    let document = Parser::new(
        "<extends src=\"layout.html\"><block name=\"body\">X</block></extends>",
        0,
    )
    .parse()
    .expect("parse failed");
    let options = options();
    let loader = site();
    let first = rewrite(document.nodes, "index.html", &options, &loader).expect("first");
    let second = rewrite(first.tree.clone(), "index.html", &options, &loader).expect("second");
    assert_eq!(second.tree, first.tree);
    assert!(second.dependencies.is_empty());
}

#[test]
fn missing_layout_surfaces_load_error() {
    let err = run_with("<extends src=\"nope.html\"></extends>", &options(), &site())
        .expect_err("should fail");
    match err {
        ExtendError::Load(LoadError::Io { path, .. }) => {
            assert_eq!(path, PathBuf::from("/site/nope.html"))
        }
        other => panic!("expected a load error, got {:?}", other),
    }
}

#[test]
fn unparsable_layout_surfaces_parse_error() {
    let loader = MemoryLoader::new().with_file("/site/broken.html", "<div></span>");
    let err = run_with("<extends src=\"broken.html\"></extends>", &options(), &loader)
        .expect_err("should fail");
    let ExtendError::Load(LoadError::Parse { errors, .. }) = &err else {
        panic!("expected a parse error, got {:?}", err);
    };
    assert_eq!(errors.len(), 1);
    assert!(err.to_string().contains("unexpected closing tag `</span>`"));
}

#[test]
fn self_extending_layout_hits_depth_limit() {
    let loader = MemoryLoader::new().with_file(
        "/site/loop.html",
        "<extends src=\"loop.html\"><block name=\"x\"></block></extends>",
    );
    let options = ExtendOptions {
        max_depth: 8,
        ..options()
    };
    let err = run_with("<extends src=\"loop.html\"></extends>", &options, &loader)
        .expect_err("should fail");
    assert!(matches!(err, ExtendError::ChainTooDeep { limit: 8, .. }));
}

#[test]
fn resolver_steps_are_usable_directly() {
    let options = options();
    let loader = site();
    let mut resolver = Resolver::new(&options, &loader);
    let document = Parser::new("<extends src=\"layout.html\"></extends>", 0)
        .parse()
        .expect("parse failed");
    let template = extend::template::adapt(document.nodes, &options);
    let Some(extend::template::TemplateNode::Extends(extends)) = template.into_iter().next() else {
        panic!("expected an extends node");
    };
    let merged = resolver.resolve(extends, "index.html").expect("resolve");
    assert!(
        merged
            .iter()
            .all(|node| !matches!(node, extend::template::TemplateNode::Block(_)))
    );
    assert_eq!(resolver.dependencies().len(), 1);
}

#[test]
fn dependency_wire_shape() {
    let dependency = Dependency::new("/site/layout.html", "index.html");
    let json = serde_json::to_value(&dependency).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!({
            "type": "dependency",
            "file": "/site/layout.html",
            "from": "index.html",
        })
    );
}

#[test]
fn options_from_toml() {
    let options: ExtendOptions = toml::from_str(
        r#"
        root = "templates"
        strict = false
        fill_tag_name = "fill"
        "#,
    )
    .expect("valid options");
    assert_eq!(options.root, PathBuf::from("templates"));
    assert!(!options.strict);
    assert_eq!(options.fill_tag_name, "fill");
    assert_eq!(options.tag_name, "extends");
    assert_eq!(options.max_depth, 64);
}

#[test]
fn filesystem_layouts_and_markdown() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("layout.html"), LAYOUT).expect("write layout");
    std::fs::write(
        dir.path().join("post.md"),
        "# Title\n\n<block name=\"body\">default</block>\n",
    )
    .expect("write post");

    let options = ExtendOptions::default().with_root(dir.path());
    let document = Parser::new(
        "<extends src=\"layout.html\"><block name=\"head\">H</block></extends>",
        0,
    )
    .parse()
    .expect("parse failed");
    let resolved = rewrite(document.nodes, "page.html", &options, FsLoader).expect("rewrite");
    assert_eq!(
        resolved.dependencies,
        vec![Dependency::new(dir.path().join("layout.html"), "page.html")]
    );
    assert_eq!(
        Document::from(resolved.tree).to_string(),
        "<html><head>H</head><body>body</body></html>"
    );

    let document = Parser::new(
        "<extends src=\"post.md\"><block name=\"body\">X</block></extends>",
        0,
    )
    .parse()
    .expect("parse failed");
    let resolved = rewrite(document.nodes, "page.html", &options, FsLoader).expect("rewrite");
    assert_eq!(
        resolved.into_document().to_string(),
        "<h1>Title</h1>\n<p>X</p>\n"
    );
}
