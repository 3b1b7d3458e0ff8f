use dt_diagnostic::{Diagnostic, DiagnosticCollector, Severity};
use dts_reader::{
    value::{
        Byte, CellElement, Integer, MacroExpression, MacroRef, MixedElement, PhandleRef,
        PropertyValue, Radix, ValueKind,
    },
    ConditionalKind, NodeId, ParseErrorKind, ParseOptions, ParseOutcome, PropertyError, ScanError,
    ScopeImbalance, TextRange, TreeRegistry,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

const BOARD: &str = include_str!("../test_data/board.dts");
const OVERLAY: &str = include_str!("../test_data/overlay.dts");
const UNBALANCED: &str = include_str!("../test_data/unbalanced.dts");
const CONDITIONALS: &str = include_str!("../test_data/conditionals.dts");

struct PanickingDiagnosticCollector;
impl DiagnosticCollector for PanickingDiagnosticCollector {
    fn emit(&self, diag: Diagnostic) {
        panic!("Diagnostic emitted: {diag}");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn parse_clean(text: &str, source: &str) -> ParseOutcome {
    init_tracing();
    dts_reader::parse_with(
        text,
        source,
        &ParseOptions::default(),
        &PanickingDiagnosticCollector,
    )
    .unwrap()
}

fn value<'a>(outcome: &'a ParseOutcome, path: &str, property: &str) -> &'a PropertyValue {
    let id = outcome
        .lookup(path)
        .unwrap_or_else(|| panic!("no node at {path}"));
    outcome[id]
        .property(property)
        .unwrap_or_else(|| panic!("no {property} in {path}"))
        .value()
}

fn int(text: &str) -> CellElement {
    CellElement::Integer(Integer::from_text(text).unwrap())
}

fn phandle(text: &str) -> CellElement {
    CellElement::Phandle(PhandleRef::from_text(text).unwrap())
}

fn macro_ref(text: &str) -> CellElement {
    CellElement::Macro(MacroRef::from_text(text).unwrap())
}

#[test]
fn two_nodes() {
    let outcome = parse_clean(r#"/ { a { x = "s"; }; b@0 { }; };"#, "two.dts");
    let root = outcome.root().unwrap();

    let children: Vec<_> = outcome[root]
        .children
        .iter()
        .map(|&id| outcome[id].full_name())
        .collect();
    assert_eq!(children, vec!["a", "b@0"]);

    let a = outcome.child(root, "a").unwrap();
    let x = outcome[a].property("x").unwrap();
    assert_eq!(x.value(), &PropertyValue::String("s".to_owned()));
    assert_eq!(x.last_record().value_span.range, TextRange::new(12, 15));

    let b = outcome.child(root, "b@0").unwrap();
    assert_eq!(outcome[b].name, "b");
    assert_eq!(outcome[b].unit_address.as_deref(), Some("0"));
    assert!(outcome[b].properties().is_empty());
}

#[test]
fn board_structure() {
    let outcome = parse_clean(BOARD, "board.dts");

    let paths: Vec<_> = outcome.iter_preorder().map(|id| outcome.path(id)).collect();
    assert_eq!(
        paths,
        vec![
            "/",
            "/chosen",
            "/soc",
            "/soc/interrupt-controller@1000",
            "/soc/serial@2000",
            "/soc/gpio@3000",
            "/leds",
            "/leds/led@0",
            "&uart0",
        ]
    );

    let serial = outcome.lookup("/soc/serial@2000").unwrap();
    assert_eq!(outcome[serial].label.as_deref(), Some("uart0"));
    assert_eq!(outcome[serial].unit_address.as_deref(), Some("2000"));
    assert_eq!(outcome.find(outcome.root().unwrap(), "gpio0"), outcome.lookup("/soc/gpio@3000"));

    let fragments: Vec<NodeId> = outcome.fragments().collect();
    assert_eq!(fragments.len(), 1);
    let fragment = &outcome[fragments[0]];
    assert!(fragment.is_overlay_fragment);
    assert_eq!(fragment.name, "&uart0");
    assert_eq!(fragment.parent, None);
    assert_eq!(fragment.header_span.range, TextRange::new(1065, 1073));
    assert_eq!(
        fragment.property("status").unwrap().last_record().key_span.range,
        TextRange::new(1075, 1081)
    );
    assert_eq!(
        fragment.property("status").unwrap().last_record().lines.start,
        56
    );
}

#[test]
fn board_header() {
    let outcome = parse_clean(BOARD, "board.dts");
    assert!(outcome.has_dts_version);
    assert!(!outcome.is_plugin);

    let includes: Vec<_> = outcome
        .includes
        .iter()
        .map(|include| (include.path.as_str(), include.relative, include.is_preprocessor))
        .collect();
    assert_eq!(
        includes,
        vec![
            ("dt-bindings/gpio/gpio.h", false, true),
            ("soc.dtsi", true, true),
        ]
    );
}

#[test]
fn board_values() {
    let outcome = parse_clean(BOARD, "board.dts");

    assert_eq!(
        value(&outcome, "/", "model"),
        &PropertyValue::String("Example Board".to_owned())
    );
    assert_eq!(
        value(&outcome, "/", "compatible"),
        &PropertyValue::StringList(vec!["example,board".to_owned(), "example,soc".to_owned()])
    );
    assert_eq!(
        value(&outcome, "/", "#address-cells"),
        &PropertyValue::Cells(vec![int("1")])
    );
    assert_eq!(
        value(&outcome, "/chosen", "stdout-path"),
        &PropertyValue::Alias(PhandleRef::from_text("&uart0").unwrap())
    );
    assert_eq!(
        value(&outcome, "/chosen", "bootargs"),
        &PropertyValue::String("console=ttyS0,115200 root=/dev/mmcblk0p2 { };".to_owned())
    );
    assert_eq!(value(&outcome, "/soc", "ranges"), &PropertyValue::Marker);

    assert_eq!(
        value(&outcome, "/soc/serial@2000", "interrupts-extended"),
        &PropertyValue::Cells(vec![
            phandle("&intc"),
            int("4"),
            CellElement::Expression(
                MacroExpression::from_text("(IRQ_TYPE_LEVEL_HIGH | 0x10)").unwrap()
            ),
        ])
    );
    assert_eq!(
        value(&outcome, "/soc/serial@2000", "status"),
        &PropertyValue::String("disabled".to_owned())
    );

    let mac = value(&outcome, "/soc/gpio@3000", "mac-address")
        .as_bytes()
        .unwrap();
    assert_eq!(
        mac.iter().map(|byte| byte.value).collect::<Vec<_>>(),
        vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x55]
    );
    assert!(mac.iter().all(|byte| byte.radix == Radix::Hex));

    let pinctrl = value(&outcome, "/soc/gpio@3000", "pinctrl-0")
        .as_cells()
        .unwrap();
    assert_eq!(pinctrl.len(), 2);
    let CellElement::Expression(expr) = &pinctrl[0] else {
        panic!("expected an expression, got {:?}", pinctrl[0]);
    };
    assert_eq!(expr.text, "GPIO_PIN(1, 2)");
    assert_eq!(expr.macros, vec!["GPIO_PIN"]);
    assert_eq!(pinctrl[1], macro_ref("GPIO_ACTIVE_LOW"));

    assert_eq!(
        value(&outcome, "/leds/led@0", "gpios"),
        &PropertyValue::Cells(vec![phandle("&gpio0"), int("1"), macro_ref("GPIO_ACTIVE_HIGH")])
    );
    assert_eq!(
        value(&outcome, "/leds/led@0", "label"),
        &PropertyValue::Mixed(vec![
            MixedElement::String("green".to_owned()),
            MixedElement::Cells(vec![int("1")]),
            MixedElement::Bytes(vec![Byte::new(2, Radix::Dec)]),
        ])
    );

    assert_eq!(
        value(&outcome, "&uart0", "status"),
        &PropertyValue::String("okay".to_owned())
    );
}

#[test]
fn board_spans() {
    let outcome = parse_clean(BOARD, "board.dts");

    let root = &outcome[outcome.root().unwrap()];
    assert_eq!(root.header_span.range, TextRange::new(112, 115));
    assert_eq!(root.header_span.lines.map(|lines| lines.start), Some(7));
    assert_eq!(root.node_span.range, TextRange::new(115, 1061));
    assert_eq!(root.property_block_span.range, TextRange::new(115, 233));

    let model = root.property("model").unwrap().last_record();
    assert_eq!(model.key_span.range, TextRange::new(117, 122));
    assert_eq!(model.value_span.range, TextRange::new(125, 140));
    assert_eq!(model.lines.start, 8);
    assert_eq!(model.value_span.text(BOARD), Some("\"Example Board\""));

    let ranges = outcome[outcome.lookup("/soc").unwrap()]
        .property("ranges")
        .unwrap()
        .last_record();
    assert_eq!(ranges.key_span, ranges.value_span);
    assert_eq!(ranges.key_span.range, TextRange::new(371, 377));
    assert_eq!(ranges.lines.start, 20);

    let serial = &outcome[outcome.lookup("/soc/serial@2000").unwrap()];
    let clock = serial.property("clock-frequency").unwrap();
    assert_eq!(clock.history().len(), 1);
    assert_eq!(clock.last_record().lines.start, 34);
    assert_eq!(serial.property("interrupts-extended").unwrap().last_record().lines.start, 32);

    let led = &outcome[outcome.lookup("/leds/led@0").unwrap()];
    assert_eq!(led.node_span.range, TextRange::new(980, 1054));
    assert_eq!(led.property_block_span, led.node_span);
    let label = led.property("label").unwrap().last_record();
    assert_eq!(label.key_span.range.start, 1024);
    assert_eq!(label.lines.start, 50);
}

#[test]
fn span_containment() {
    let outcome = parse_clean(BOARD, "board.dts");

    for (_, node) in outcome.nodes() {
        let (node_span, block) = (node.node_span.range, node.property_block_span.range);
        assert!(node_span.start <= block.start, "{}", node.full_name());
        assert!(block.start <= block.end, "{}", node.full_name());
        assert!(block.end <= node_span.end, "{}", node.full_name());
        assert!(node.header_span.range.end <= node_span.start);

        for prop in node.properties() {
            let record = prop.last_record();
            assert!(block.contains_range(record.key_span.range), "{}", prop.name());
            assert!(block.contains_range(record.value_span.range), "{}", prop.name());
            assert!(record.key_span.range.end <= record.value_span.range.end);
            assert_eq!(record.key_span.text(BOARD), Some(prop.name()));
        }

        for &child in &node.children {
            assert!(node_span.contains_range(outcome[child].node_span.range));
            assert!(outcome[child].header_span.range.start >= block.end);
        }
    }
}

#[test]
fn fragment_next_to_root() {
    let outcome = parse_clean("/ { };\n&foo { bar; };\n", "frag.dts");
    assert_eq!(outcome.roots().len(), 2);

    let foo = outcome.lookup("&foo").unwrap();
    assert!(outcome[foo].is_overlay_fragment);
    assert_eq!(outcome[foo].label, None);
    assert_eq!(outcome[foo].properties().len(), 1);
    let bar = outcome[foo].property("bar").unwrap();
    assert_eq!(bar.value(), &PropertyValue::Marker);
    assert_eq!(bar.last_record().value_span.range, TextRange::new(14, 17));
}

#[test]
fn path_fragment_lookup() {
    let overlay = parse_clean(OVERLAY, "overlay.dts");

    let serial = overlay.lookup("&{/soc/serial@2000}").unwrap();
    assert!(overlay[serial].is_overlay_fragment);
    assert_eq!(overlay[serial].properties().len(), 1);

    let hog = overlay.lookup("&gpio0/hog").unwrap();
    assert_eq!(overlay.lookup("&{/soc/serial@2000}/hog"), None);
    assert_eq!(overlay.path(hog), "&gpio0/hog");
}

#[test]
fn nested_fragment_is_an_error() {
    init_tracing();
    let err = dts_reader::parse_with(
        "/ {\n\t&foo { };\n};\n",
        "nested.dts",
        &ParseOptions::default(),
        &PanickingDiagnosticCollector,
    )
    .unwrap_err();
    assert!(matches!(
        err.kind,
        ParseErrorKind::Scan(ScanError::OverlayMustBeTopLevel { .. })
    ));
    assert_eq!(err.line, 2);
}

#[test]
fn unbalanced_braces() {
    init_tracing();
    let err = dts_reader::parse_with(
        UNBALANCED,
        "unbalanced.dts",
        &ParseOptions::default(),
        &PanickingDiagnosticCollector,
    )
    .unwrap_err();

    assert!(matches!(
        err.kind,
        ParseErrorKind::Scan(ScanError::UnbalancedScopes {
            kind: ScopeImbalance::UnmatchedClose,
            ..
        })
    ));
    assert_eq!(err.line, 7);
    assert_eq!(err.snippet, "};");
    assert!(err.to_string().starts_with("unbalanced.dts:7: "));
}

#[test]
fn unclosed_node() {
    init_tracing();
    let err = dts_reader::parse_with(
        "/ {\n\tsoc {\n\t};\n",
        "unclosed.dts",
        &ParseOptions::default(),
        &PanickingDiagnosticCollector,
    )
    .unwrap_err();
    assert!(matches!(
        err.kind,
        ParseErrorKind::Scan(ScanError::UnbalancedScopes {
            kind: ScopeImbalance::UnclosedOpen,
            ..
        })
    ));
    assert_eq!(err.line, 1);
}

#[test]
fn root_not_found() {
    init_tracing();
    let err = dts_reader::parse_with(
        "/dts-v1/;\n&foo { };\n",
        "fragment.dtsi",
        &ParseOptions::default(),
        &PanickingDiagnosticCollector,
    )
    .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Scan(ScanError::RootNotFound));
}

#[test]
fn conditionals_are_recorded() {
    init_tracing();
    let diag = Mutex::new(Vec::<Diagnostic>::new());
    let outcome =
        dts_reader::parse_with(CONDITIONALS, "conditionals.dts", &ParseOptions::default(), &diag)
            .unwrap();

    let cpus = &outcome[outcome.lookup("/cpus").unwrap()];
    let directives: Vec<_> = cpus
        .conditionals
        .iter()
        .map(|cond| (cond.kind, cond.expression.as_str(), cond.line))
        .collect();
    assert_eq!(
        directives,
        vec![
            (ConditionalKind::Ifdef, "CONFIG_SMP", 5),
            (ConditionalKind::Else, "", 7),
        ]
    );
    assert_eq!(
        cpus.property("enable-method").map(|prop| prop.value().kind()),
        Some(ValueKind::String)
    );
    assert_eq!(
        cpus.property("spin-table").map(|prop| prop.value().kind()),
        Some(ValueKind::Marker)
    );

    let diags = diag.into_inner();
    assert_eq!(diags.len(), 2);
    assert!(diags.iter().all(|diag| diag.severity == Severity::Warn));
}

#[test]
fn conditional_warnings_can_be_disabled() {
    let options = ParseOptions {
        warn_on_conditionals: false,
        ..ParseOptions::default()
    };
    init_tracing();
    let outcome = dts_reader::parse_with(
        CONDITIONALS,
        "conditionals.dts",
        &options,
        &PanickingDiagnosticCollector,
    )
    .unwrap();
    assert_eq!(outcome[outcome.lookup("/cpus").unwrap()].conditionals.len(), 2);
}

#[test]
fn duplicate_property() {
    init_tracing();
    let err = dts_reader::parse_with(
        "/ {\n\tstatus = \"okay\";\n\tstatus = \"disabled\";\n};\n",
        "dup.dts",
        &ParseOptions::default(),
        &PanickingDiagnosticCollector,
    )
    .unwrap_err();

    let ParseErrorKind::Property(PropertyError::DuplicateProperty { name, first, .. }) = &err.kind
    else {
        panic!("expected a duplicate property error, got {err}");
    };
    assert_eq!(name, "status");
    assert_eq!(first.start, 5);
    assert_eq!(err.line, 3);
}

#[test]
fn unclassifiable_value_aborts() {
    init_tracing();
    let err = dts_reader::parse_with(
        "/ {\n\treg = <0x10 0x1g>;\n};\n",
        "bad.dts",
        &ParseOptions::default(),
        &PanickingDiagnosticCollector,
    )
    .unwrap_err();

    assert!(matches!(err.kind, ParseErrorKind::Value(_)));
    assert_eq!(err.line, 2);
    assert_eq!(err.snippet, "0x1g");
}

#[test]
fn keep_raw_values() {
    init_tracing();
    let options = ParseOptions {
        unclassifiable: dts_reader::UnclassifiablePolicy::KeepRaw,
        ..ParseOptions::default()
    };
    let diag = Mutex::new(Vec::<Diagnostic>::new());
    let outcome =
        dts_reader::parse_with("/ {\n\treg = <0x10 0x1g>;\n};\n", "bad.dts", &options, &diag)
            .unwrap();

    assert_eq!(
        value(&outcome, "/", "reg"),
        &PropertyValue::Unparsed("<0x10 0x1g>".to_owned())
    );
    assert_eq!(diag.into_inner().len(), 1);
}

#[test]
fn missing_semicolon_before_close() {
    init_tracing();
    let diag = Mutex::new(Vec::<Diagnostic>::new());
    let outcome = dts_reader::parse_with(
        "/ {\n\tx = <1>\n};\n",
        "unterminated.dts",
        &ParseOptions::default(),
        &diag,
    )
    .unwrap();

    assert!(outcome[outcome.root().unwrap()].property("x").is_none());
    let diags = diag.into_inner();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Warn);
    assert_eq!(diags[0].span.primary_spans, vec![TextRange::new(5, 12)]);
    assert_eq!(diags[0].lines.map(|lines| lines.start), Some(2));
}

#[test]
fn statements_after_children_are_reported() {
    init_tracing();
    let diag = Mutex::new(Vec::<Diagnostic>::new());
    let outcome = dts_reader::parse_with(
        "/ {\n\ta { };\n\tstatus = \"okay\";\n\tb { };\n\t/delete-node/ c;\n\tmodel;\n};\n",
        "late.dts",
        &ParseOptions::default(),
        &diag,
    )
    .unwrap();

    let root = outcome.root().unwrap();
    assert!(outcome[root].properties().is_empty());
    assert_eq!(outcome[root].children.len(), 2);

    let diags = diag.into_inner();
    assert_eq!(
        diags
            .iter()
            .map(|diag| diag.lines.map(|lines| lines.start))
            .collect::<Vec<_>>(),
        vec![Some(3), Some(6)]
    );
    assert!(diags.iter().all(|diag| diag.severity == Severity::Warn));
}

#[test]
fn registry() {
    let board = parse_clean(BOARD, "board.dts");
    let overlay = parse_clean(OVERLAY, "overlay.dts");
    assert!(overlay.is_plugin);

    let registry = TreeRegistry::from_outcomes([&board, &overlay], &PanickingDiagnosticCollector);

    let uart = registry.by_label("uart0").unwrap();
    assert_eq!(uart.path(), "/soc/serial@2000");
    assert!(std::ptr::eq(uart.outcome, &board));
    assert_eq!(registry.by_path("/soc/serial@2000"), Some(uart));
    assert_eq!(registry.by_name("serial"), Some(uart));
    assert_eq!(registry.by_label("missing"), None);

    // `/` from both files
    assert_eq!(registry.all_named("/").len(), 2);
    // `hog` lives inside the `&gpio0` fragment
    assert_eq!(registry.all_named("hog").len(), 1);

    let board_fragment = dts_reader::NodeRef {
        outcome: &board,
        id: board.lookup("&uart0").unwrap(),
    };
    assert_eq!(registry.resolve_fragment(board_fragment), Some(uart));

    let targets: Vec<_> = overlay
        .fragments()
        .map(|id| {
            registry
                .resolve_fragment(dts_reader::NodeRef {
                    outcome: &overlay,
                    id,
                })
                .map(|node| node.path())
        })
        .collect();
    assert_eq!(
        targets,
        vec![
            Some("/soc/serial@2000".to_owned()),
            Some("/soc/gpio@3000".to_owned()),
        ]
    );

    assert_eq!(registry.resolve_fragment(uart), None);
}

#[test]
fn registry_first_label_wins() {
    let first = parse_clean(BOARD, "board.dts");
    let second = parse_clean(BOARD, "copy.dts");

    let diag = Mutex::new(Vec::<Diagnostic>::new());
    let registry = TreeRegistry::from_outcomes([&first, &second], &diag);

    assert!(std::ptr::eq(registry.by_label("intc").unwrap().outcome, &first));
    let diags = diag.into_inner();
    // intc, uart0, gpio0
    assert_eq!(diags.len(), 3);
    assert!(diags
        .iter()
        .all(|diag| diag.source.as_deref() == Some("copy.dts")));
}
