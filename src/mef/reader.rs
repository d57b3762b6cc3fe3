//! MEF document reader: turns an `<opsa-mef>` XML document into a
//! [`Model`], following the same event-driven `quick_xml` idiom as the
//! rest of this codebase's XML importers — a single forward pass over
//! `Reader::read_event_into`, matching on `e.name().as_ref()`.
//!
//! Declarations are expected bottom-up (parameters, then basic/house
//! events, then gates, in dependency order) the way most hand-written MEF
//! documents are laid out; a forward reference surfaces as
//! `UndefinedElement` rather than being resolved in a second pass.

use crate::error::{ScramError, SourceSpan};
use crate::model::ccf::{CcfGroup, CcfModel};
use crate::model::event::{BasicEvent, Gate, HouseEvent};
use crate::model::expression::{ArithOp, BuiltIn, Deviate, Expression, Unit};
use crate::model::fault_tree::FaultTree;
use crate::model::formula::{Formula, FormulaArg, Operator};
use crate::model::parameter::Parameter;
use crate::model::Model;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

struct Context {
    file: Option<PathBuf>,
    mission_time: crate::model::mission_time::MissionTimeHandle,
    parameters: HashMap<String, Rc<Parameter>>,
    basic_events: HashMap<String, Rc<BasicEvent>>,
    house_events: HashMap<String, Rc<HouseEvent>>,
    gates: HashMap<String, Rc<Gate>>,
}

impl Context {
    fn span(&self) -> SourceSpan {
        match &self.file {
            Some(f) => SourceSpan::new(f.clone(), 0),
            None => SourceSpan::unknown(),
        }
    }
}

pub fn read_model_file(path: impl AsRef<Path>) -> Result<Model, ScramError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    read_model_str(&content, Some(path.to_path_buf()))
}

pub fn read_model_str(xml: &str, file: Option<PathBuf>) -> Result<Model, ScramError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut model = Model::new();
    let mut ctx = Context {
        file,
        mission_time: model.mission_time.clone(),
        parameters: HashMap::new(),
        basic_events: HashMap::new(),
        house_events: HashMap::new(),
        gates: HashMap::new(),
    };

    let mut current_tree: Option<FaultTree> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"define-fault-tree" => {
                    let name = required_attr(e, "name", &ctx)?;
                    current_tree = Some(FaultTree::new(name));
                }
                b"define-gate" => {
                    let name = required_attr(e, "name", &ctx)?;
                    let (tag, attrs) = next_child_tag(&mut reader, b"define-gate", &ctx)?;
                    let formula = parse_formula(&mut reader, &mut ctx, &tag, &attrs)?;
                    skip_to_end(&mut reader, b"define-gate", &ctx)?;
                    let gate = Gate::new(name, formula);
                    ctx.gates.insert(gate.id().to_string(), gate.clone());
                    if let Some(tree) = current_tree.as_mut() {
                        tree.add_gate(gate);
                    }
                }
                b"define-basic-event" => {
                    let name = required_attr(e, "name", &ctx)?;
                    let be = BasicEvent::new(name);
                    if let Some(expr) = parse_optional_expression(&mut reader, b"define-basic-event", &mut ctx)? {
                        be.assign_expression(expr)?;
                    }
                    ctx.basic_events.insert(be.id().to_string(), be.clone());
                    if let Some(tree) = current_tree.as_mut() {
                        tree.add_basic_event(be);
                    }
                }
                b"define-house-event" => {
                    let name = required_attr(e, "name", &ctx)?;
                    let state = parse_house_state(&mut reader, &ctx)?;
                    let he = HouseEvent::new(name, state);
                    ctx.house_events.insert(he.id().to_string(), he.clone());
                    if let Some(tree) = current_tree.as_mut() {
                        tree.add_house_event(he);
                    }
                }
                b"define-parameter" => {
                    let name = required_attr(e, "name", &ctx)?;
                    let unit = optional_attr(e, "unit").map(|u| parse_unit(&u)).unwrap_or(Unit::Unitless);
                    let expr = parse_required_expression(&mut reader, b"define-parameter", &mut ctx)?;
                    let parameter = Parameter::new(name, unit, expr);
                    ctx.parameters.insert(parameter.id().to_string(), parameter.clone());
                    model.parameters.add(parameter);
                }
                b"define-CCF-group" => {
                    let group = parse_ccf_group(&mut reader, e, &mut ctx)?;
                    model.ccf_groups.push(group);
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"define-fault-tree" => {
                if let Some(mut tree) = current_tree.take() {
                    tree.promote_unreferenced_gates_to_top();
                    model.add_fault_tree(tree);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(err, &ctx)),
            _ => {}
        }
    }

    model.parameters.validate(ctx.span())?;
    model.expand_ccf_groups(ctx.span())?;
    model.recompute_orphans();
    Ok(model)
}

fn xml_error(err: quick_xml::Error, ctx: &Context) -> ScramError {
    ScramError::Io {
        message: format!("XML parse error: {err}"),
        span: ctx.span(),
    }
}

fn attrs_map(e: &BytesStart, ctx: &Context) -> Result<HashMap<String, String>, ScramError> {
    let mut out = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ScramError::Io {
            message: format!("attribute error: {err}"),
            span: ctx.span(),
        })?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| ScramError::Io {
                message: format!("UTF-8 error: {err}"),
                span: ctx.span(),
            })?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| ScramError::Io {
                message: format!("XML unescape error: {err}"),
                span: ctx.span(),
            })?
            .to_string();
        out.insert(key, value);
    }
    Ok(out)
}

fn required_attr(e: &BytesStart, key: &str, ctx: &Context) -> Result<String, ScramError> {
    attrs_map(e, ctx)?
        .remove(key)
        .ok_or_else(|| ScramError::invalid_argument(format!("missing required attribute '{key}'"), ctx.span()))
}

fn optional_attr(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.to_string())
}

/// Reads forward until the next `Start`/`Empty` element, returning its tag
/// name and attributes. Used to peek at a gate's single connective child
/// (`and`, `or`, `atleast`, ...).
fn next_child_tag(
    reader: &mut Reader<&[u8]>,
    _enclosing: &[u8],
    ctx: &Context,
) -> Result<(Vec<u8>, HashMap<String, String>), ScramError> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let tag = e.name().as_ref().to_vec();
                let attrs = attrs_map(e, ctx)?;
                return Ok((tag, attrs));
            }
            Ok(Event::Eof) => {
                return Err(ScramError::Io {
                    message: "unexpected end of document while reading a gate".into(),
                    span: ctx.span(),
                })
            }
            Err(err) => return Err(xml_error(err, ctx)),
            _ => {}
        }
    }
}

/// Consumes events until the matching close tag for `tag`, tolerating
/// nested elements of the same name.
fn skip_to_end(reader: &mut Reader<&[u8]>, tag: &[u8], ctx: &Context) -> Result<(), ScramError> {
    let mut buf = Vec::new();
    let mut depth: u32 = 0;
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == tag => depth += 1,
            Ok(Event::End(ref e)) if e.name().as_ref() == tag => {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            Ok(Event::Eof) => {
                return Err(ScramError::Io {
                    message: format!("unexpected end of document, expected </{}>", String::from_utf8_lossy(tag)),
                    span: ctx.span(),
                })
            }
            Err(err) => return Err(xml_error(err, ctx)),
            _ => {}
        }
    }
}

const GATE_TAGS: &[&[u8]] = &[
    b"and", b"or", b"not", b"nand", b"nor", b"xor", b"null", b"atleast",
];

fn parse_formula(
    reader: &mut Reader<&[u8]>,
    ctx: &mut Context,
    tag: &[u8],
    attrs: &HashMap<String, String>,
) -> Result<Formula, ScramError> {
    let operator = match tag {
        b"and" => Operator::And,
        b"or" => Operator::Or,
        b"not" => Operator::Not,
        b"nand" => Operator::Nand,
        b"nor" => Operator::Nor,
        b"xor" => Operator::Xor,
        b"null" => Operator::Null,
        b"atleast" => {
            let k: u32 = attrs
                .get("min")
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| ScramError::invalid_argument("'atleast' requires a 'min' attribute", ctx.span()))?;
            Operator::AtLeast(k)
        }
        other => {
            return Err(ScramError::invalid_argument(
                format!("unknown gate connective '{}'", String::from_utf8_lossy(other)),
                ctx.span(),
            ))
        }
    };

    let args = parse_formula_args(reader, ctx, tag)?;
    Formula::new(operator, args, ctx.span())
}

fn parse_formula_args(
    reader: &mut Reader<&[u8]>,
    ctx: &mut Context,
    closing: &[u8],
) -> Result<Vec<FormulaArg>, ScramError> {
    let mut out = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::End(ref e)) if e.name().as_ref() == closing => return Ok(out),
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let tag = e.name().as_ref().to_vec();
                let attrs = attrs_map(e, ctx)?;
                if GATE_TAGS.contains(&tag.as_slice()) {
                    let nested = parse_formula(reader, ctx, &tag, &attrs)?;
                    out.push(FormulaArg::Nested(Box::new(nested)));
                    continue;
                }
                let name = attrs
                    .get("name")
                    .cloned()
                    .ok_or_else(|| ScramError::invalid_argument("formula argument missing 'name'", ctx.span()))?;
                let id = name.to_lowercase();
                match tag.as_slice() {
                    b"basic-event" | b"event" => {
                        let basic = ctx
                            .basic_events
                            .get(&id)
                            .cloned()
                            .ok_or_else(|| ScramError::UndefinedElement { id: name, span: ctx.span() })?;
                        out.push(FormulaArg::Basic(basic));
                    }
                    b"house-event" => {
                        let house = ctx
                            .house_events
                            .get(&id)
                            .cloned()
                            .ok_or_else(|| ScramError::UndefinedElement { id: name, span: ctx.span() })?;
                        out.push(FormulaArg::House(house));
                    }
                    b"gate" => {
                        let gate = ctx
                            .gates
                            .get(&id)
                            .cloned()
                            .ok_or_else(|| ScramError::UndefinedElement { id: name, span: ctx.span() })?;
                        out.push(FormulaArg::Gate(gate));
                    }
                    other => {
                        return Err(ScramError::invalid_argument(
                            format!("unexpected formula argument '{}'", String::from_utf8_lossy(other)),
                            ctx.span(),
                        ))
                    }
                }
            }
            Ok(Event::Eof) => {
                return Err(ScramError::Io {
                    message: "unexpected end of document while reading a formula".into(),
                    span: ctx.span(),
                })
            }
            Err(err) => return Err(xml_error(err, ctx)),
            _ => {}
        }
    }
}

fn parse_house_state(reader: &mut Reader<&[u8]>, ctx: &Context) -> Result<bool, ScramError> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"constant" => {
                let attrs = attrs_map(e, ctx)?;
                return Ok(attrs.get("value").map(|v| v == "true").unwrap_or(false));
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"define-house-event" => return Ok(false),
            Ok(Event::Eof) => {
                return Err(ScramError::Io {
                    message: "unexpected end of document while reading a house event".into(),
                    span: ctx.span(),
                })
            }
            Err(err) => return Err(xml_error(err, ctx)),
            _ => {}
        }
    }
}

fn parse_unit(value: &str) -> Unit {
    match value {
        "bool" => Unit::Bool,
        "int" => Unit::Int,
        "float" => Unit::Float,
        "hours" => Unit::Hours,
        "hours-1" | "per-hour" => Unit::PerHour,
        "years" => Unit::Years,
        "years-1" | "per-year" => Unit::PerYear,
        "fit" => Unit::Fit,
        "demands" => Unit::Demands,
        _ => Unit::Unitless,
    }
}

/// Reads the single expression child of `define-basic-event`/`define-parameter`,
/// returning `None` if the element closes with no expression (an
/// unassigned basic event, e.g. one driven entirely by a CCF group).
fn parse_optional_expression(
    reader: &mut Reader<&[u8]>,
    enclosing: &[u8],
    ctx: &mut Context,
) -> Result<Option<Expression>, ScramError> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::End(ref e)) if e.name().as_ref() == enclosing => return Ok(None),
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let tag = e.name().as_ref().to_vec();
                let attrs = attrs_map(e, ctx)?;
                let expr = parse_expression_node(reader, ctx, &tag, &attrs)?;
                skip_to_end(reader, enclosing, ctx)?;
                return Ok(Some(expr));
            }
            Ok(Event::Eof) => {
                return Err(ScramError::Io {
                    message: "unexpected end of document while reading an expression".into(),
                    span: ctx.span(),
                })
            }
            Err(err) => return Err(xml_error(err, ctx)),
            _ => {}
        }
    }
}

fn parse_required_expression(
    reader: &mut Reader<&[u8]>,
    enclosing: &[u8],
    ctx: &mut Context,
) -> Result<Expression, ScramError> {
    parse_optional_expression(reader, enclosing, ctx)?
        .ok_or_else(|| ScramError::invalid_argument("expected an expression", ctx.span()))
}

const EXPR_LEAF_TAGS: &[&[u8]] = &[b"float", b"int", b"parameter", b"system-mission-time"];
const EXPR_ARITH_TAGS: &[&[u8]] = &[b"add", b"sub", b"mul", b"div", b"neg", b"abs", b"min", b"max"];
const EXPR_DEVIATE_TAGS: &[&[u8]] = &[
    b"uniform-deviate",
    b"normal-deviate",
    b"lognormal-deviate",
    b"gamma-deviate",
    b"beta-deviate",
    b"histogram",
];
const EXPR_BUILTIN_TAGS: &[&[u8]] = &[b"exponential", b"GLM", b"weibull", b"periodic-test"];

fn parse_expression_node(
    reader: &mut Reader<&[u8]>,
    ctx: &mut Context,
    tag: &[u8],
    attrs: &HashMap<String, String>,
) -> Result<Expression, ScramError> {
    if EXPR_LEAF_TAGS.contains(&tag) {
        return parse_leaf_expression(tag, attrs, ctx);
    }
    if EXPR_ARITH_TAGS.contains(&tag) {
        let op = match tag {
            b"add" => ArithOp::Add,
            b"sub" => ArithOp::Sub,
            b"mul" => ArithOp::Mul,
            b"div" => ArithOp::Div,
            b"neg" => ArithOp::Neg,
            b"abs" => ArithOp::Abs,
            b"min" => ArithOp::Min,
            b"max" => ArithOp::Max,
            _ => unreachable!(),
        };
        let children = parse_expression_children(reader, ctx, tag)?;
        return Expression::arith(op, children, ctx.span());
    }
    if EXPR_DEVIATE_TAGS.contains(&tag) {
        return parse_deviate(reader, ctx, tag);
    }
    if EXPR_BUILTIN_TAGS.contains(&tag) {
        return parse_built_in(reader, ctx, tag);
    }
    Err(ScramError::invalid_argument(
        format!("unsupported expression element '{}'", String::from_utf8_lossy(tag)),
        ctx.span(),
    ))
}

fn parse_leaf_expression(tag: &[u8], attrs: &HashMap<String, String>, ctx: &Context) -> Result<Expression, ScramError> {
    match tag {
        b"float" | b"int" => {
            let value: f64 = attrs
                .get("value")
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| ScramError::invalid_argument("missing or invalid 'value' attribute", ctx.span()))?;
            Ok(Expression::constant(value))
        }
        b"parameter" => {
            let name = attrs
                .get("name")
                .ok_or_else(|| ScramError::invalid_argument("parameter reference missing 'name'", ctx.span()))?;
            let parameter = ctx
                .parameters
                .get(&name.to_lowercase())
                .cloned()
                .ok_or_else(|| ScramError::UndefinedElement {
                    id: name.clone(),
                    span: ctx.span(),
                })?;
            Ok(Expression::parameter(parameter))
        }
        b"system-mission-time" => Ok(Expression::mission_time(ctx.mission_time.clone())),
        _ => unreachable!(),
    }
}

fn parse_expression_children(
    reader: &mut Reader<&[u8]>,
    ctx: &mut Context,
    closing: &[u8],
) -> Result<Vec<Expression>, ScramError> {
    let mut out = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::End(ref e)) if e.name().as_ref() == closing => return Ok(out),
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let tag = e.name().as_ref().to_vec();
                let attrs = attrs_map(e, ctx)?;
                out.push(parse_expression_node(reader, ctx, &tag, &attrs)?);
            }
            Ok(Event::Eof) => {
                return Err(ScramError::Io {
                    message: "unexpected end of document while reading an expression list".into(),
                    span: ctx.span(),
                })
            }
            Err(err) => return Err(xml_error(err, ctx)),
            _ => {}
        }
    }
}

fn parse_deviate(reader: &mut Reader<&[u8]>, ctx: &mut Context, tag: &[u8]) -> Result<Expression, ScramError> {
    if tag == b"histogram" {
        return parse_histogram(reader, ctx);
    }
    let children = parse_expression_children(reader, ctx, tag)?;
    let means: Vec<f64> = children.iter().map(Expression::mean).collect();
    let deviate = match tag {
        b"uniform-deviate" => Deviate::Uniform {
            min: *means.first().unwrap_or(&0.0),
            max: *means.get(1).unwrap_or(&1.0),
        },
        b"normal-deviate" => Deviate::Normal {
            mean: *means.first().unwrap_or(&0.0),
            sigma: *means.get(1).unwrap_or(&1.0),
        },
        // Three children is the legacy mean/error-factor/confidence-level
        // form; two is the v0.12 mu/sigma form (spec.md §3).
        b"lognormal-deviate" if means.len() >= 3 => Deviate::LogNormalEf {
            mean: means[0],
            ef: means[1],
            level: means[2],
        },
        b"lognormal-deviate" => Deviate::LogNormal {
            mu: *means.first().unwrap_or(&0.0),
            sigma: *means.get(1).unwrap_or(&1.0),
        },
        b"gamma-deviate" => Deviate::Gamma {
            k: *means.first().unwrap_or(&1.0),
            theta: *means.get(1).unwrap_or(&1.0),
        },
        b"beta-deviate" => Deviate::Beta {
            alpha: *means.first().unwrap_or(&1.0),
            beta: *means.get(1).unwrap_or(&1.0),
        },
        _ => unreachable!(),
    };
    Expression::deviate(deviate, ctx.span())
}

/// `<histogram>` holds an ordered sequence of `<bin>` elements, each with
/// two expression children: the bin's upper boundary and its weight
/// (spec.md §3 "Histogram(boundaries,weights)").
fn parse_histogram(reader: &mut Reader<&[u8]>, ctx: &mut Context) -> Result<Expression, ScramError> {
    let mut boundaries = Vec::new();
    let mut weights = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::End(ref e)) if e.name().as_ref() == b"histogram" => break,
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"bin" => {
                let children = parse_expression_children(reader, ctx, b"bin")?;
                if children.len() != 2 {
                    return Err(ScramError::invalid_argument(
                        "histogram 'bin' requires exactly two children (boundary, weight)",
                        ctx.span(),
                    ));
                }
                boundaries.push(children[0].mean());
                weights.push(children[1].mean());
            }
            Ok(Event::Eof) => {
                return Err(ScramError::Io {
                    message: "unexpected end of document while reading a histogram".into(),
                    span: ctx.span(),
                })
            }
            Err(err) => return Err(xml_error(err, ctx)),
            _ => {}
        }
    }
    Expression::deviate(Deviate::Histogram { boundaries, weights }, ctx.span())
}

fn parse_built_in(reader: &mut Reader<&[u8]>, ctx: &mut Context, tag: &[u8]) -> Result<Expression, ScramError> {
    let children = parse_expression_children(reader, ctx, tag)?;
    if tag == b"periodic-test" {
        return Expression::built_in(parse_periodic_test(&children, ctx)?, ctx.span());
    }
    let built_in = match tag {
        b"exponential" => BuiltIn::Exponential {
            lambda: Box::new(children.first().cloned().unwrap_or_else(|| Expression::constant(0.0))),
            time: Box::new(children.get(1).cloned().unwrap_or_else(|| Expression::constant(0.0))),
        },
        b"GLM" => BuiltIn::Glm {
            gamma: Box::new(children.first().cloned().unwrap_or_else(|| Expression::constant(0.0))),
            lambda: Box::new(children.get(1).cloned().unwrap_or_else(|| Expression::constant(0.0))),
            mu: Box::new(children.get(2).cloned().unwrap_or_else(|| Expression::constant(0.0))),
            time: Box::new(children.get(3).cloned().unwrap_or_else(|| Expression::constant(0.0))),
        },
        b"weibull" => BuiltIn::Weibull {
            alpha: Box::new(children.first().cloned().unwrap_or_else(|| Expression::constant(1.0))),
            beta: Box::new(children.get(1).cloned().unwrap_or_else(|| Expression::constant(1.0))),
            t0: Box::new(children.get(2).cloned().unwrap_or_else(|| Expression::constant(0.0))),
            time: Box::new(children.get(3).cloned().unwrap_or_else(|| Expression::constant(0.0))),
        },
        _ => unreachable!(),
    };
    Expression::built_in(built_in, ctx.span())
}

/// The `<periodic-test>` built-in takes 4, 5, or 11 children depending on
/// which variant is in use (spec.md §3): `(lambda, tau, theta, t)`, the
/// same plus test duration, or the full repair/replacement/detection form.
fn parse_periodic_test(children: &[Expression], ctx: &Context) -> Result<BuiltIn, ScramError> {
    let c = |i: usize| children.get(i).cloned().unwrap_or_else(|| Expression::constant(0.0));
    let pt = match children.len() {
        4 => crate::model::expression::PeriodicTest::Basic {
            lambda: Box::new(c(0)),
            tau: Box::new(c(1)),
            theta: Box::new(c(2)),
            time: Box::new(c(3)),
        },
        5 => crate::model::expression::PeriodicTest::WithDuration {
            lambda: Box::new(c(0)),
            tau: Box::new(c(1)),
            theta: Box::new(c(2)),
            test_duration: Box::new(c(3)),
            time: Box::new(c(4)),
        },
        11 => crate::model::expression::PeriodicTest::Full {
            lambda_active: Box::new(c(0)),
            lambda_standby: Box::new(c(1)),
            tau: Box::new(c(2)),
            theta: Box::new(c(3)),
            test_duration: Box::new(c(4)),
            repair_duration: Box::new(c(5)),
            detection_probability: Box::new(c(6)),
            available_at_test: Box::new(c(7)),
            available_at_repair: Box::new(c(8)),
            replace_on_test: Box::new(c(9)),
            time: Box::new(c(10)),
        },
        n => {
            return Err(ScramError::invalid_argument(
                format!("'periodic-test' takes 4, 5, or 11 arguments, got {n}"),
                ctx.span(),
            ))
        }
    };
    Ok(BuiltIn::PeriodicTest(pt))
}

fn parse_ccf_group(reader: &mut Reader<&[u8]>, e: &BytesStart, ctx: &mut Context) -> Result<CcfGroup, ScramError> {
    let name = required_attr(e, "name", ctx)?;
    let model_name = required_attr(e, "model", ctx)?;

    let mut members: Vec<Rc<BasicEvent>> = Vec::new();
    let mut factors: Vec<f64> = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::End(ref e)) if e.name().as_ref() == b"define-CCF-group" => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"basic-event" => {
                let member_name = required_attr(e, "name", ctx)?;
                let id = member_name.to_lowercase();
                let member = ctx
                    .basic_events
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| {
                        let be = BasicEvent::new(member_name.clone());
                        ctx.basic_events.insert(id, be.clone());
                        be
                    });
                members.push(member);
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"factor" => {
                let expr = parse_required_expression(reader, b"factor", ctx)?;
                factors.push(expr.mean());
            }
            Ok(Event::Eof) => {
                return Err(ScramError::Io {
                    message: "unexpected end of document while reading a CCF group".into(),
                    span: ctx.span(),
                })
            }
            Err(err) => return Err(xml_error(err, ctx)),
            _ => {}
        }
    }

    let model = match model_name.as_str() {
        "beta-factor" => CcfModel::BetaFactor {
            beta: *factors.first().unwrap_or(&0.0),
        },
        "MGL" => CcfModel::Mgl { rho: factors },
        "alpha-factor" => CcfModel::AlphaFactor { alpha: factors },
        "phi-factor" => CcfModel::PhiFactor { phi: factors },
        other => {
            return Err(ScramError::invalid_argument(
                format!("unknown CCF model '{other}'"),
                ctx.span(),
            ))
        }
    };
    CcfGroup::new(name, members, model, ctx.span())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_minimal_and_gate() {
        let xml = r#"
<opsa-mef>
  <define-fault-tree name="Example">
    <define-basic-event name="A">
      <float value="0.1"/>
    </define-basic-event>
    <define-basic-event name="B">
      <float value="0.2"/>
    </define-basic-event>
    <define-gate name="Top">
      <and>
        <basic-event name="A"/>
        <basic-event name="B"/>
      </and>
    </define-gate>
  </define-fault-tree>
</opsa-mef>
"#;
        let model = read_model_str(xml, None).unwrap();
        assert_eq!(model.fault_trees.len(), 1);
        let tree = &model.fault_trees[0];
        assert_eq!(tree.top_gates().len(), 1);
        let top = &tree.top_gates()[0];
        assert_eq!(top.formula().args().len(), 2);
    }

    #[test]
    fn reads_a_parameter_and_ccf_group() {
        let xml = r#"
<opsa-mef>
  <define-parameter name="Q">
    <float value="0.05"/>
  </define-parameter>
  <define-fault-tree name="Example">
    <define-basic-event name="A">
      <parameter name="Q"/>
    </define-basic-event>
    <define-basic-event name="B">
      <parameter name="Q"/>
    </define-basic-event>
    <define-gate name="Top">
      <or>
        <basic-event name="A"/>
        <basic-event name="B"/>
      </or>
    </define-gate>
  </define-fault-tree>
  <define-CCF-group name="G1" model="beta-factor">
    <basic-event name="A"/>
    <basic-event name="B"/>
    <factor><float value="0.1"/></factor>
  </define-CCF-group>
</opsa-mef>
"#;
        let model = read_model_str(xml, None).unwrap();
        assert_eq!(model.ccf_groups.len(), 1);
        // Two members => 2^2 - 1 = 3 CCF subset events, named "<group>-[<members>]".
        assert!(model.basic_event("g1-[a]").is_some());
        assert!(model.basic_event("g1-[b]").is_some());
        assert!(model.basic_event("g1-[a b]").is_some());
    }

    #[test]
    fn reads_a_periodic_test_basic_event() {
        // spec.md §8 S3: lambda=1e-3/h, tau=720h, theta=360h, t=1000h.
        let xml = r#"
<opsa-mef>
  <define-fault-tree name="Example">
    <define-basic-event name="Pump">
      <periodic-test>
        <float value="1e-3"/>
        <float value="720"/>
        <float value="360"/>
        <float value="1000"/>
      </periodic-test>
    </define-basic-event>
    <define-gate name="Top">
      <null>
        <basic-event name="Pump"/>
      </null>
    </define-gate>
  </define-fault-tree>
</opsa-mef>
"#;
        let model = read_model_str(xml, None).unwrap();
        let pump = model.basic_event("pump").unwrap();
        assert!((pump.probability().unwrap() - 0.4727).abs() < 1e-3);
    }

    #[test]
    fn reads_a_histogram_deviate() {
        let xml = r#"
<opsa-mef>
  <define-fault-tree name="Example">
    <define-basic-event name="A">
      <histogram>
        <bin><float value="0.5"/><float value="1.0"/></bin>
        <bin><float value="1.0"/><float value="2.0"/></bin>
      </histogram>
    </define-basic-event>
    <define-gate name="Top">
      <null>
        <basic-event name="A"/>
      </null>
    </define-gate>
  </define-fault-tree>
</opsa-mef>
"#;
        let model = read_model_str(xml, None).unwrap();
        let a = model.basic_event("a").unwrap();
        assert!(a.probability().unwrap() > 0.0);
    }
}
