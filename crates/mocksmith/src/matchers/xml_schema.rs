//! XML_SCHEMA body matcher and the XSD validator behind it.
//!
//! The validator understands the commonly used part of XML Schema 1.0:
//! global and local element declarations (`ref`, `type`, inline types,
//! `minOccurs`/`maxOccurs`), named and anonymous complex types with
//! `sequence`/`choice`/`all`/`any` content, `complexContent` and
//! `simpleContent` extensions, attributes (`use`, `fixed`, `anyAttribute`),
//! `mixed` content, and simple types restricted by `enumeration`, `pattern`,
//! `length`, `minLength`, `maxLength`, `minInclusive` and `maxInclusive` over
//! the built-in string, numeric, boolean and date types.
//!
//! Malformed schemas and documents never raise; they surface as validation
//! messages and therefore as a non-match.

use super::difference::MatchDifference;
use super::regex_string::regex_matches;
use super::xml::{XmlChild, XmlNode};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const MAX_DEPTH: usize = 64;

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn attr<'a>(node: &'a XmlNode, name: &str) -> Option<&'a str> {
    node.attributes
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn element_children(node: &XmlNode) -> Vec<&XmlNode> {
    node.children
        .iter()
        .filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
        .collect()
}

fn occurs(node: &XmlNode) -> Result<(u32, Option<u32>), String> {
    let min = match attr(node, "minOccurs") {
        Some(v) => v
            .parse()
            .map_err(|_| format!("invalid minOccurs \"{v}\""))?,
        None => 1,
    };
    let max = match attr(node, "maxOccurs") {
        Some("unbounded") => None,
        Some(v) => Some(v.parse().map_err(|_| format!("invalid maxOccurs \"{v}\""))?),
        None => Some(1),
    };
    Ok((min, max))
}

#[derive(Debug, Clone)]
enum TypeRef {
    Named(String),
    Complex(Box<ComplexType>),
    Simple(SimpleType),
    Any,
}

#[derive(Debug, Clone)]
struct ElementDecl {
    name: String,
    reference: bool,
    type_ref: TypeRef,
    min: u32,
    max: Option<u32>,
}

#[derive(Debug, Clone)]
enum GroupKind {
    Sequence,
    Choice,
    All,
}

#[derive(Debug, Clone)]
enum Particle {
    Element(ElementDecl),
    Group(Group),
    Any { min: u32, max: Option<u32> },
}

impl Particle {
    fn min(&self) -> u32 {
        match self {
            Particle::Element(e) => e.min,
            Particle::Group(g) => g.min,
            Particle::Any { min, .. } => *min,
        }
    }

    fn describe(&self) -> String {
        match self {
            Particle::Element(e) => e.name.clone(),
            Particle::Group(g) => g
                .particles
                .iter()
                .map(Particle::describe)
                .collect::<Vec<_>>()
                .join(", "),
            Particle::Any { .. } => "any element".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Group {
    kind: GroupKind,
    particles: Vec<Particle>,
    min: u32,
    max: Option<u32>,
}

#[derive(Debug, Clone)]
struct AttributeDecl {
    name: String,
    simple: Option<SimpleType>,
    required: bool,
    fixed: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct ComplexType {
    base: Option<String>,
    group: Option<Group>,
    simple: Option<SimpleType>,
    attributes: Vec<AttributeDecl>,
    any_attribute: bool,
    mixed: bool,
}

#[derive(Debug, Clone, Default)]
struct SimpleType {
    base: String,
    enumerations: Vec<String>,
    patterns: Vec<String>,
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_inclusive: Option<f64>,
    max_inclusive: Option<f64>,
}

impl SimpleType {
    fn of(base: &str) -> Self {
        Self {
            base: local(base).to_string(),
            ..Default::default()
        }
    }
}

/// Content model of a complex type after following its base types.
struct Effective {
    group: Option<Group>,
    simple: Option<SimpleType>,
    attributes: Vec<AttributeDecl>,
    any_attribute: bool,
    mixed: bool,
}

#[derive(Debug)]
enum Builtin {
    String,
    Integer { min: Option<i64>, max: Option<i64> },
    Decimal,
    Boolean,
    Date,
    DateTime,
    Time,
    Any,
}

fn builtin(name: &str) -> Option<Builtin> {
    let builtin = match name {
        "string" | "normalizedString" | "token" | "anyURI" | "QName" | "ID" | "IDREF"
        | "IDREFS" | "NCName" | "Name" | "NMTOKEN" | "NMTOKENS" | "language" | "base64Binary"
        | "hexBinary" | "duration" | "gYear" | "gYearMonth" | "gMonth" | "gMonthDay"
        | "gDay" => Builtin::String,
        "integer" | "int" | "long" | "short" | "byte" => Builtin::Integer {
            min: None,
            max: None,
        },
        "nonNegativeInteger" | "unsignedInt" | "unsignedLong" | "unsignedShort"
        | "unsignedByte" => Builtin::Integer {
            min: Some(0),
            max: None,
        },
        "positiveInteger" => Builtin::Integer {
            min: Some(1),
            max: None,
        },
        "nonPositiveInteger" => Builtin::Integer {
            min: None,
            max: Some(0),
        },
        "negativeInteger" => Builtin::Integer {
            min: None,
            max: Some(-1),
        },
        "decimal" | "double" | "float" => Builtin::Decimal,
        "boolean" => Builtin::Boolean,
        "date" => Builtin::Date,
        "dateTime" => Builtin::DateTime,
        "time" => Builtin::Time,
        "anyType" | "anySimpleType" => Builtin::Any,
        _ => return None,
    };
    Some(builtin)
}

fn check_builtin(builtin: &Builtin, text: &str) -> Result<(), String> {
    let value = text.trim();
    let ok = match builtin {
        Builtin::String | Builtin::Any => true,
        Builtin::Integer { min, max } => match value.parse::<i64>() {
            Ok(n) => min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m),
            Err(_) => false,
        },
        Builtin::Decimal => value.parse::<f64>().is_ok(),
        Builtin::Boolean => matches!(value, "true" | "false" | "1" | "0"),
        Builtin::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        Builtin::DateTime => {
            DateTime::parse_from_rfc3339(value).is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
        Builtin::Time => NaiveTime::parse_from_str(value, "%H:%M:%S%.f").is_ok(),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("'{value}' is not a valid value for {builtin:?}"))
    }
}

/// Parsed XML schema.
#[derive(Debug)]
pub struct XmlSchemaValidator {
    elements: HashMap<String, ElementDecl>,
    complex_types: HashMap<String, ComplexType>,
    simple_types: HashMap<String, SimpleType>,
}

impl XmlSchemaValidator {
    pub fn new(schema: &str) -> Result<Self, String> {
        let root = XmlNode::parse(schema).map_err(|e| format!("invalid XML schema: {e}"))?;
        if root.name != "schema" {
            return Err(format!(
                "invalid XML schema: root element is <{}>, expected <schema>",
                root.name
            ));
        }

        let mut validator = Self {
            elements: HashMap::new(),
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
        };
        for child in element_children(&root) {
            match child.name.as_str() {
                "element" => {
                    let decl = parse_element(child)?;
                    validator.elements.insert(decl.name.clone(), decl);
                }
                "complexType" => {
                    let name = attr(child, "name")
                        .ok_or("invalid XML schema: global complexType without name")?;
                    validator
                        .complex_types
                        .insert(name.to_string(), parse_complex(child)?);
                }
                "simpleType" => {
                    let name = attr(child, "name")
                        .ok_or("invalid XML schema: global simpleType without name")?;
                    validator
                        .simple_types
                        .insert(name.to_string(), parse_simple(child)?);
                }
                _ => {}
            }
        }
        if validator.elements.is_empty() {
            return Err("invalid XML schema: no global element declarations".to_string());
        }
        Ok(validator)
    }

    /// Validation messages, empty when `xml` is valid.
    pub fn validate(&self, xml: &str) -> Vec<String> {
        let root = match XmlNode::parse(xml) {
            Ok(root) => root,
            Err(e) => return vec![e],
        };
        let mut errors = Vec::new();
        match self.elements.get(&root.name) {
            Some(decl) => {
                self.validate_element(&root, decl, &format!("/{}", root.name), &mut errors, 0)
            }
            None => errors.push(format!(
                "cvc-elt.1.a: Cannot find the declaration of element '{}'.",
                root.name
            )),
        }
        errors
    }

    fn validate_element(
        &self,
        node: &XmlNode,
        decl: &ElementDecl,
        path: &str,
        errors: &mut Vec<String>,
        depth: usize,
    ) {
        if depth > MAX_DEPTH {
            errors.push(format!("{path}: schema nesting too deep"));
            return;
        }
        let decl = if decl.reference {
            match self.elements.get(&decl.name) {
                Some(global) => global,
                None => {
                    errors.push(format!(
                        "{path}: cannot resolve element reference '{}'",
                        decl.name
                    ));
                    return;
                }
            }
        } else {
            decl
        };
        self.validate_type(node, &decl.type_ref, path, errors, depth);
    }

    fn validate_type(
        &self,
        node: &XmlNode,
        type_ref: &TypeRef,
        path: &str,
        errors: &mut Vec<String>,
        depth: usize,
    ) {
        match type_ref {
            TypeRef::Any => {}
            TypeRef::Complex(ct) => self.validate_complex(node, ct, path, errors, depth),
            TypeRef::Simple(st) => self.validate_simple_element(node, st, path, errors),
            TypeRef::Named(name) => {
                if let Some(ct) = self.complex_types.get(name) {
                    self.validate_complex(node, ct, path, errors, depth);
                } else if let Some(st) = self.simple_types.get(name) {
                    self.validate_simple_element(node, st, path, errors);
                } else if matches!(builtin(name), Some(Builtin::Any)) {
                } else if builtin(name).is_some() {
                    self.validate_simple_element(node, &SimpleType::of(name), path, errors);
                } else {
                    errors.push(format!("{path}: unknown type '{name}'"));
                }
            }
        }
    }

    fn validate_simple_element(
        &self,
        node: &XmlNode,
        simple: &SimpleType,
        path: &str,
        errors: &mut Vec<String>,
    ) {
        if let Some(child) = element_children(node).first() {
            errors.push(format!(
                "cvc-type.3.1.2: Element '{}' is a simple type, so it must have no element information item [children], found '{}'.",
                node.name, child.name
            ));
            return;
        }
        if let Some((name, _)) = node.attributes.iter().find(|(n, _)| !is_namespaced(n)) {
            errors.push(format!(
                "cvc-type.3.1.1: Element '{}' is a simple type, so it cannot have attributes, found '{}'.",
                node.name, name
            ));
        }
        if let Err(e) = self.check_simple(simple, &node.text(), 0) {
            errors.push(format!("{path}: {e}"));
        }
    }

    fn check_simple(&self, simple: &SimpleType, text: &str, depth: usize) -> Result<(), String> {
        if depth > MAX_DEPTH {
            return Err("simple type nesting too deep".to_string());
        }
        match builtin(&simple.base) {
            Some(b) => check_builtin(&b, text)?,
            None => match self.simple_types.get(&simple.base) {
                Some(base) => self.check_simple(base, text, depth + 1)?,
                None => return Err(format!("unknown simple type '{}'", simple.base)),
            },
        }

        let value = text.trim();
        if !simple.enumerations.is_empty() && !simple.enumerations.iter().any(|e| e == value) {
            return Err(format!(
                "cvc-enumeration-valid: Value '{value}' is not facet-valid with respect to enumeration '[{}]'.",
                simple.enumerations.join(", ")
            ));
        }
        if !simple.patterns.is_empty() && !simple.patterns.iter().any(|p| regex_matches(p, value, false)) {
            return Err(format!(
                "cvc-pattern-valid: Value '{value}' is not facet-valid with respect to pattern '{}'.",
                simple.patterns.join("|")
            ));
        }
        let length = value.chars().count();
        if simple.length.is_some_and(|l| length != l)
            || simple.min_length.is_some_and(|l| length < l)
            || simple.max_length.is_some_and(|l| length > l)
        {
            return Err(format!(
                "cvc-length-valid: Value '{value}' with length = '{length}' is not facet-valid with respect to its length facets."
            ));
        }
        if simple.min_inclusive.is_some() || simple.max_inclusive.is_some() {
            let number: f64 = value
                .parse()
                .map_err(|_| format!("Value '{value}' is not numeric"))?;
            if simple.min_inclusive.is_some_and(|m| number < m)
                || simple.max_inclusive.is_some_and(|m| number > m)
            {
                return Err(format!(
                    "cvc-inclusive-valid: Value '{value}' is not facet-valid with respect to its range facets."
                ));
            }
        }
        Ok(())
    }

    fn effective(&self, ct: &ComplexType, depth: usize) -> Effective {
        let own = Effective {
            group: ct.group.clone(),
            simple: ct.simple.clone(),
            attributes: ct.attributes.clone(),
            any_attribute: ct.any_attribute,
            mixed: ct.mixed,
        };
        let base = match &ct.base {
            Some(name) if depth < MAX_DEPTH => match self.complex_types.get(name) {
                Some(base) => self.effective(base, depth + 1),
                None => return own,
            },
            _ => return own,
        };

        let group = match (base.group, own.group) {
            (Some(inherited), Some(extension)) => Some(Group {
                kind: GroupKind::Sequence,
                particles: vec![Particle::Group(inherited), Particle::Group(extension)],
                min: 1,
                max: Some(1),
            }),
            (inherited, extension) => extension.or(inherited),
        };
        let mut attributes = base.attributes;
        attributes.extend(own.attributes);
        Effective {
            group,
            simple: own.simple.or(base.simple),
            attributes,
            any_attribute: own.any_attribute || base.any_attribute,
            mixed: own.mixed || base.mixed,
        }
    }

    fn validate_complex(
        &self,
        node: &XmlNode,
        ct: &ComplexType,
        path: &str,
        errors: &mut Vec<String>,
        depth: usize,
    ) {
        let effective = self.effective(ct, 0);

        for decl in &effective.attributes {
            match attr(node, &decl.name) {
                Some(value) => {
                    if let Some(simple) = &decl.simple {
                        if let Err(e) = self.check_simple(simple, value, 0) {
                            errors.push(format!("{path}/@{}: {e}", decl.name));
                        }
                    }
                    if let Some(fixed) = &decl.fixed {
                        if fixed != value {
                            errors.push(format!(
                                "cvc-attribute.4: The value '{value}' of attribute '{}' on element '{}' is not valid with respect to its fixed value '{fixed}'.",
                                decl.name, node.name
                            ));
                        }
                    }
                }
                None if decl.required => errors.push(format!(
                    "cvc-complex-type.4: Attribute '{}' must appear on element '{}'.",
                    decl.name, node.name
                )),
                None => {}
            }
        }
        if !effective.any_attribute {
            for (name, _) in &node.attributes {
                if is_namespaced(name) || effective.attributes.iter().any(|d| &d.name == name) {
                    continue;
                }
                errors.push(format!(
                    "cvc-complex-type.3.2.2: Attribute '{}' is not allowed to appear in element '{}'.",
                    name, node.name
                ));
            }
        }

        let children = element_children(node);
        if let Some(simple) = &effective.simple {
            if let Some(child) = children.first() {
                errors.push(format!(
                    "{path}: element '{}' has simple content, found child '{}'",
                    node.name, child.name
                ));
            } else if let Err(e) = self.check_simple(simple, &node.text(), 0) {
                errors.push(format!("{path}: {e}"));
            }
            return;
        }

        if !effective.mixed && !node.text().is_empty() {
            errors.push(format!(
                "cvc-complex-type.2.3: Element '{}' cannot have character [children], because the type's content type is element-only.",
                node.name
            ));
        }

        match &effective.group {
            None => {
                if let Some(child) = children.first() {
                    errors.push(format!(
                        "cvc-complex-type.2.1: Element '{}' must have no character or element information item [children], because the type's content type is empty, found '{}'.",
                        node.name, child.name
                    ));
                }
            }
            Some(group) => match self.match_occurrences(group, &children, 0, node, path, errors, depth) {
                Ok(consumed) if consumed < children.len() => errors.push(format!(
                    "cvc-complex-type.2.4.d: Invalid content was found starting with element '{}'. No child element is expected at this point.",
                    children[consumed].name
                )),
                Ok(_) => {}
                Err(e) => errors.push(e),
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn match_occurrences(
        &self,
        group: &Group,
        children: &[&XmlNode],
        start: usize,
        parent: &XmlNode,
        path: &str,
        errors: &mut Vec<String>,
        depth: usize,
    ) -> Result<usize, String> {
        let mut count = 0u32;
        let mut pos = start;
        while group.max.is_none_or(|m| count < m) {
            // Errors of an occurrence only count once it is taken
            let mut scratch = Vec::new();
            match self.match_group_once(group, children, pos, parent, path, &mut scratch, depth) {
                Ok(next) if next > pos => {
                    errors.append(&mut scratch);
                    pos = next;
                    count += 1;
                }
                Ok(_) => break,
                Err(e) if count < group.min => return Err(e),
                Err(_) => break,
            }
        }
        Ok(pos)
    }

    #[allow(clippy::too_many_arguments)]
    fn match_group_once(
        &self,
        group: &Group,
        children: &[&XmlNode],
        start: usize,
        parent: &XmlNode,
        path: &str,
        errors: &mut Vec<String>,
        depth: usize,
    ) -> Result<usize, String> {
        match group.kind {
            GroupKind::Sequence => {
                let mut pos = start;
                for particle in &group.particles {
                    pos = self.match_particle(particle, children, pos, parent, path, errors, depth)?;
                }
                Ok(pos)
            }
            GroupKind::Choice => {
                for particle in &group.particles {
                    let mut scratch = Vec::new();
                    if let Ok(next) = self.match_particle(
                        particle,
                        children,
                        start,
                        parent,
                        path,
                        &mut scratch,
                        depth,
                    ) {
                        if next > start {
                            errors.append(&mut scratch);
                            return Ok(next);
                        }
                    }
                }
                if group.particles.iter().any(|p| p.min() == 0) {
                    Ok(start)
                } else {
                    Err(unexpected(parent, children.get(start).copied(), group))
                }
            }
            GroupKind::All => {
                let mut seen = vec![false; group.particles.len()];
                let mut pos = start;
                'children: while let Some(child) = children.get(pos) {
                    for (i, particle) in group.particles.iter().enumerate() {
                        if let Particle::Element(decl) = particle {
                            if !seen[i] && decl.name == child.name {
                                self.validate_element(
                                    child,
                                    decl,
                                    &format!("{path}/{}", child.name),
                                    errors,
                                    depth + 1,
                                );
                                seen[i] = true;
                                pos += 1;
                                continue 'children;
                            }
                        }
                    }
                    break;
                }
                for (i, particle) in group.particles.iter().enumerate() {
                    if !seen[i] && particle.min() > 0 {
                        return Err(format!(
                            "cvc-complex-type.2.4.b: The content of element '{}' is not complete. One of '{{{}}}' is expected.",
                            parent.name,
                            particle.describe()
                        ));
                    }
                }
                Ok(pos)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn match_particle(
        &self,
        particle: &Particle,
        children: &[&XmlNode],
        start: usize,
        parent: &XmlNode,
        path: &str,
        errors: &mut Vec<String>,
        depth: usize,
    ) -> Result<usize, String> {
        match particle {
            Particle::Element(decl) => {
                let mut count = 0u32;
                let mut pos = start;
                while decl.max.is_none_or(|m| count < m) {
                    match children.get(pos) {
                        Some(child) if child.name == decl.name => {
                            self.validate_element(
                                child,
                                decl,
                                &format!("{path}/{}", child.name),
                                errors,
                                depth + 1,
                            );
                            pos += 1;
                            count += 1;
                        }
                        _ => break,
                    }
                }
                if count < decl.min {
                    let found = children.get(pos).copied();
                    return Err(match found {
                        Some(child) => format!(
                            "cvc-complex-type.2.4.a: Invalid content was found starting with element '{}'. One of '{{{}}}' is expected.",
                            child.name, decl.name
                        ),
                        None => format!(
                            "cvc-complex-type.2.4.b: The content of element '{}' is not complete. One of '{{{}}}' is expected.",
                            parent.name, decl.name
                        ),
                    });
                }
                Ok(pos)
            }
            Particle::Group(group) => {
                self.match_occurrences(group, children, start, parent, path, errors, depth)
            }
            Particle::Any { min, max } => {
                let available = (children.len() - start.min(children.len())) as u32;
                let taken = max.map_or(available, |m| available.min(m));
                if taken < *min {
                    return Err(format!(
                        "cvc-complex-type.2.4.b: The content of element '{}' is not complete.",
                        parent.name
                    ));
                }
                Ok(start + taken as usize)
            }
        }
    }
}

fn is_namespaced(attribute: &str) -> bool {
    attribute.starts_with('{') || attribute.starts_with("xmlns")
}

fn unexpected(parent: &XmlNode, found: Option<&XmlNode>, group: &Group) -> String {
    let expected = group
        .particles
        .iter()
        .map(Particle::describe)
        .collect::<Vec<_>>()
        .join(", ");
    match found {
        Some(child) => format!(
            "cvc-complex-type.2.4.a: Invalid content was found starting with element '{}'. One of '{{{expected}}}' is expected.",
            child.name
        ),
        None => format!(
            "cvc-complex-type.2.4.b: The content of element '{}' is not complete. One of '{{{expected}}}' is expected.",
            parent.name
        ),
    }
}

fn parse_element(node: &XmlNode) -> Result<ElementDecl, String> {
    let (min, max) = occurs(node)?;
    if let Some(reference) = attr(node, "ref") {
        return Ok(ElementDecl {
            name: local(reference).to_string(),
            reference: true,
            type_ref: TypeRef::Any,
            min,
            max,
        });
    }
    let name = attr(node, "name")
        .ok_or("invalid XML schema: element without name or ref")?
        .to_string();

    let type_ref = if let Some(type_name) = attr(node, "type") {
        TypeRef::Named(local(type_name).to_string())
    } else {
        let inline = element_children(node);
        if let Some(ct) = inline.iter().find(|c| c.name == "complexType") {
            TypeRef::Complex(Box::new(parse_complex(ct)?))
        } else if let Some(st) = inline.iter().find(|c| c.name == "simpleType") {
            TypeRef::Simple(parse_simple(st)?)
        } else {
            TypeRef::Any
        }
    };

    Ok(ElementDecl {
        name,
        reference: false,
        type_ref,
        min,
        max,
    })
}

fn parse_group(node: &XmlNode) -> Result<Group, String> {
    let kind = match node.name.as_str() {
        "sequence" => GroupKind::Sequence,
        "choice" => GroupKind::Choice,
        "all" => GroupKind::All,
        other => return Err(format!("invalid XML schema: unsupported model group <{other}>")),
    };
    let (min, max) = occurs(node)?;
    let mut particles = Vec::new();
    for child in element_children(node) {
        match child.name.as_str() {
            "element" => particles.push(Particle::Element(parse_element(child)?)),
            "sequence" | "choice" | "all" => particles.push(Particle::Group(parse_group(child)?)),
            "any" => {
                let (min, max) = occurs(child)?;
                particles.push(Particle::Any { min, max });
            }
            _ => {}
        }
    }
    Ok(Group {
        kind,
        particles,
        min,
        max,
    })
}

fn parse_attribute(node: &XmlNode) -> Result<AttributeDecl, String> {
    let name = attr(node, "name")
        .or_else(|| attr(node, "ref").map(local))
        .ok_or("invalid XML schema: attribute without name or ref")?
        .to_string();
    let simple = match attr(node, "type") {
        Some(type_name) => Some(SimpleType::of(type_name)),
        None => match element_children(node).into_iter().find(|c| c.name == "simpleType") {
            Some(st) => Some(parse_simple(st)?),
            None => None,
        },
    };
    Ok(AttributeDecl {
        name,
        simple,
        required: attr(node, "use") == Some("required"),
        fixed: attr(node, "fixed").map(str::to_string),
    })
}

/// Read attributes and model groups of a complex type or a derivation.
fn parse_content(node: &XmlNode, target: &mut ComplexType) -> Result<(), String> {
    for child in element_children(node) {
        match child.name.as_str() {
            "sequence" | "choice" | "all" => target.group = Some(parse_group(child)?),
            "attribute" => target.attributes.push(parse_attribute(child)?),
            "anyAttribute" => target.any_attribute = true,
            _ => {}
        }
    }
    Ok(())
}

fn parse_complex(node: &XmlNode) -> Result<ComplexType, String> {
    let mut ct = ComplexType {
        mixed: attr(node, "mixed") == Some("true"),
        ..Default::default()
    };
    parse_content(node, &mut ct)?;

    for child in element_children(node) {
        match child.name.as_str() {
            "complexContent" => {
                if attr(child, "mixed") == Some("true") {
                    ct.mixed = true;
                }
                for derivation in element_children(child) {
                    if let Some(base) = attr(derivation, "base") {
                        if derivation.name == "extension" {
                            ct.base = Some(local(base).to_string());
                        }
                    }
                    parse_content(derivation, &mut ct)?;
                }
            }
            "simpleContent" => {
                for derivation in element_children(child) {
                    let base = attr(derivation, "base")
                        .ok_or("invalid XML schema: simpleContent derivation without base")?;
                    let mut simple = SimpleType::of(base);
                    read_facets(derivation, &mut simple);
                    ct.simple = Some(simple);
                    parse_content(derivation, &mut ct)?;
                }
            }
            _ => {}
        }
    }
    Ok(ct)
}

fn parse_simple(node: &XmlNode) -> Result<SimpleType, String> {
    for child in element_children(node) {
        match child.name.as_str() {
            "restriction" => {
                let mut simple = match attr(child, "base") {
                    Some(base) => SimpleType::of(base),
                    None => match element_children(child).into_iter().find(|c| c.name == "simpleType") {
                        Some(inner) => parse_simple(inner)?,
                        None => SimpleType::of("string"),
                    },
                };
                read_facets(child, &mut simple);
                return Ok(simple);
            }
            "list" | "union" => return Ok(SimpleType::of("string")),
            _ => {}
        }
    }
    Err("invalid XML schema: simpleType without restriction, list or union".to_string())
}

fn read_facets(node: &XmlNode, simple: &mut SimpleType) {
    for facet in element_children(node) {
        let Some(value) = attr(facet, "value") else {
            continue;
        };
        match facet.name.as_str() {
            "enumeration" => simple.enumerations.push(value.to_string()),
            "pattern" => simple.patterns.push(value.to_string()),
            "length" => simple.length = value.parse().ok(),
            "minLength" => simple.min_length = value.parse().ok(),
            "maxLength" => simple.max_length = value.parse().ok(),
            "minInclusive" => simple.min_inclusive = value.parse().ok(),
            "maxInclusive" => simple.max_inclusive = value.parse().ok(),
            _ => {}
        }
    }
}

/// XML_SCHEMA body matcher; validation failures become match differences.
#[derive(Debug, Clone)]
pub struct XmlSchemaMatcher {
    validator: Result<Arc<XmlSchemaValidator>, String>,
}

impl XmlSchemaMatcher {
    pub fn new(schema: &str) -> Self {
        Self {
            validator: XmlSchemaValidator::new(schema).map(Arc::new),
        }
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: &str) -> bool {
        let errors = match &self.validator {
            Ok(validator) => validator.validate(matched),
            Err(e) => {
                debug!("xml schema matcher cannot use schema: {}", e);
                vec![e.clone()]
            }
        };
        if errors.is_empty() {
            return true;
        }
        if let Some(ctx) = context {
            ctx.add(format!(
                "xml schema match failed, {} error(s):\n  {}",
                errors.len(),
                errors.join("\n  ")
            ));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::difference::MatchDifferenceField;

    const NOTE_SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" elementFormDefault="qualified">
    <xs:element name="notes">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="note" maxOccurs="unbounded">
                    <xs:complexType>
                        <xs:sequence>
                            <xs:element name="to" minOccurs="1" maxOccurs="unbounded">
                                <xs:simpleType>
                                    <xs:restriction base="xs:string">
                                        <xs:maxLength value="10"/>
                                    </xs:restriction>
                                </xs:simpleType>
                            </xs:element>
                            <xs:element name="from" type="xs:string"/>
                            <xs:element name="heading" type="xs:string"/>
                            <xs:element name="body" type="xs:string"/>
                        </xs:sequence>
                        <xs:attribute name="priority" type="priorityType" use="required"/>
                    </xs:complexType>
                </xs:element>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
    <xs:simpleType name="priorityType">
        <xs:restriction base="xs:string">
            <xs:enumeration value="low"/>
            <xs:enumeration value="high"/>
        </xs:restriction>
    </xs:simpleType>
</xs:schema>"#;

    fn note(to: &str, priority: &str, extra: &str) -> String {
        format!(
            r#"<notes><note priority="{priority}"><to>{to}</to><from>Jani</from><heading>Reminder</heading><body>Don't forget me this weekend!</body>{extra}</note></notes>"#
        )
    }

    #[test]
    fn test_valid_document() {
        let validator = XmlSchemaValidator::new(NOTE_SCHEMA).unwrap();
        assert_eq!(validator.validate(&note("Bob", "high", "")), Vec::<String>::new());
    }

    #[test]
    fn test_invalid_documents() {
        let validator = XmlSchemaValidator::new(NOTE_SCHEMA).unwrap();

        let errors = validator.validate(&note("A very long recipient", "high", ""));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("cvc-length-valid"));

        let errors = validator.validate(&note("Bob", "urgent", ""));
        assert!(errors[0].contains("cvc-enumeration-valid"));

        let errors = validator.validate(&note("Bob", "low", "<footer/>"));
        assert!(errors[0].contains("cvc-complex-type.2.4.d"));

        let errors = validator.validate("<notes><note priority=\"low\"><to>Bob</to></note></notes>");
        assert!(errors[0].contains("cvc-complex-type.2.4.b"));

        let errors = validator.validate("<memo/>");
        assert!(errors[0].contains("cvc-elt.1.a"));
    }

    #[test]
    fn test_failed_choice_alternative_leaves_no_errors() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="record">
                <xs:complexType>
                    <xs:choice>
                        <xs:sequence>
                            <xs:element name="code" type="xs:positiveInteger"/>
                            <xs:element name="count" type="xs:string"/>
                        </xs:sequence>
                        <xs:sequence>
                            <xs:element name="code" type="xs:string"/>
                            <xs:element name="label" type="xs:string"/>
                        </xs:sequence>
                    </xs:choice>
                </xs:complexType>
            </xs:element>
        </xs:schema>"#;
        let validator = XmlSchemaValidator::new(schema).unwrap();

        assert_eq!(
            validator.validate("<record><code>abc</code><label>x</label></record>"),
            Vec::<String>::new()
        );
        assert_eq!(
            validator.validate("<record><code>12</code><count>x</count></record>"),
            Vec::<String>::new()
        );
        assert!(!validator
            .validate("<record><code>abc</code><count>x</count></record>")
            .is_empty());
    }

    #[test]
    fn test_choice_all_and_extension() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:complexType name="base">
                <xs:sequence><xs:element name="id" type="xs:positiveInteger"/></xs:sequence>
            </xs:complexType>
            <xs:complexType name="payment">
                <xs:complexContent>
                    <xs:extension base="base">
                        <xs:choice>
                            <xs:element name="card" type="xs:string"/>
                            <xs:element name="cash" type="xs:decimal"/>
                        </xs:choice>
                    </xs:extension>
                </xs:complexContent>
            </xs:complexType>
            <xs:element name="payment" type="payment"/>
            <xs:element name="meta">
                <xs:complexType>
                    <xs:all>
                        <xs:element name="a" type="xs:boolean"/>
                        <xs:element name="b" type="xs:date" minOccurs="0"/>
                    </xs:all>
                </xs:complexType>
            </xs:element>
        </xs:schema>"#;
        let validator = XmlSchemaValidator::new(schema).unwrap();

        assert!(validator.validate("<payment><id>3</id><cash>1.50</cash></payment>").is_empty());
        assert!(!validator.validate("<payment><id>0</id><cash>1.50</cash></payment>").is_empty());
        assert!(!validator.validate("<payment><card>x</card></payment>").is_empty());
        assert!(!validator.validate("<payment><id>3</id></payment>").is_empty());

        assert!(validator.validate("<meta><b>2024-01-31</b><a>true</a></meta>").is_empty());
        assert!(validator.validate("<meta><a>0</a></meta>").is_empty());
        assert!(!validator.validate("<meta><b>2024-01-31</b></meta>").is_empty());
    }

    #[test]
    fn test_malformed_schema_is_error_not_panic() {
        assert!(XmlSchemaValidator::new("<notaschema/>").is_err());
        assert!(XmlSchemaValidator::new("<<<").is_err());
        assert!(!XmlSchemaMatcher::new("<<<").matches(None, "<a/>"));
    }

    #[test]
    fn test_matcher_records_difference() {
        let matcher = XmlSchemaMatcher::new(NOTE_SCHEMA);
        assert!(matcher.matches(None, &note("Bob", "low", "")));

        let mut diff = MatchDifference::new();
        diff.set_field(MatchDifferenceField::Body);
        assert!(!matcher.matches(Some(&mut diff), "<notes><note/></notes>"));
        assert!(diff
            .get(MatchDifferenceField::Body)
            .unwrap()
            .contains("xml schema match failed"));
    }
}
