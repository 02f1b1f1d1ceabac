//! Wire graph to host value translation

use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::amf::external::is_proxy_type;
use crate::amf::{Node, NodeId, ObjectGraph, Payload, VectorItems, WireObject, WireValue};
use crate::error::{Error, Result, TranslationError};
use crate::validator::{DeserializationValidator, NoopValidator, PropertyKey};

use super::config::{TranslatorConfig, UnknownTypePolicy};
use super::host::{AsObject, HostList, HostMap, HostObject, HostValue, AS_OBJECT_TYPE, LIST_TYPE, MAP_TYPE};
use super::registry::ClassRegistry;
use super::target::TargetType;

/// An assignment the validator declined; the property kept its default
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedAssignment {
    pub type_name: String,
    pub key: PropertyKey,
}

/// Result of a translation together with the skipped assignments
#[derive(Debug, Clone)]
pub struct Translation {
    pub value: HostValue,
    pub rejected: Vec<RejectedAssignment>,
}

/// Materializes host values from decoded payloads
///
/// Every pass checks `validate_creation` before any shell is allocated and
/// `validate_assignment` before every index or property write. A rejected
/// creation fails the pass; a rejected assignment is skipped and reported.
pub struct TypeTranslator {
    config: TranslatorConfig,
    classes: Arc<ClassRegistry>,
    validator: Arc<dyn DeserializationValidator>,
}

impl TypeTranslator {
    pub fn new(
        config: TranslatorConfig,
        classes: Arc<ClassRegistry>,
        validator: Arc<dyn DeserializationValidator>,
    ) -> Self {
        Self {
            config,
            classes,
            validator,
        }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Translate the payload root into `target`
    pub fn translate(&self, payload: &Payload, target: &TargetType) -> Result<HostValue> {
        Ok(self.translate_with_report(payload, target)?.value)
    }

    /// Translate and also return the assignments the validator declined
    pub fn translate_with_report(&self, payload: &Payload, target: &TargetType) -> Result<Translation> {
        let mut pass = TranslationPass {
            translator: self,
            graph: &payload.graph,
            identities: HashMap::new(),
            rejected: Vec::new(),
            depth: 0,
        };
        let value = pass.translate(&payload.root, target)?;
        Ok(Translation {
            value,
            rejected: pass.rejected,
        })
    }
}

impl Default for TypeTranslator {
    fn default() -> Self {
        Self::new(
            TranslatorConfig::default(),
            Arc::new(ClassRegistry::new()),
            Arc::new(NoopValidator),
        )
    }
}

/// State of one translation: identity map and rejection report
struct TranslationPass<'a> {
    translator: &'a TypeTranslator,
    graph: &'a ObjectGraph,
    identities: HashMap<NodeId, HostValue>,
    rejected: Vec<RejectedAssignment>,
    depth: usize,
}

impl TranslationPass<'_> {
    fn config(&self) -> &TranslatorConfig {
        &self.translator.config
    }

    fn validator(&self) -> &dyn DeserializationValidator {
        self.translator.validator.as_ref()
    }

    fn translate(&mut self, value: &WireValue, target: &TargetType) -> Result<HostValue> {
        let max = self.config().max_depth;
        if self.depth >= max {
            return Err(TranslationError::NestingTooDeep { max }.into());
        }
        self.depth += 1;
        let result = self.translate_value(value, target);
        self.depth -= 1;
        result
    }

    fn translate_value(&mut self, value: &WireValue, target: &TargetType) -> Result<HostValue> {
        if value.is_null_or_undefined() {
            return Ok(HostValue::Null);
        }
        if let WireValue::Node(id) = value {
            return self.translate_node(*id, target);
        }

        let unsupported = || -> Error {
            TranslationError::UnsupportedConversion {
                from: value.kind_name(),
                to: target.to_string(),
            }
            .into()
        };

        let host = match (target, value) {
            (TargetType::Any, WireValue::Bool(b)) => HostValue::Bool(*b),
            (TargetType::Any, WireValue::Integer(i)) => HostValue::Int(*i),
            (TargetType::Any, WireValue::Double(d)) => HostValue::Double(*d),
            (TargetType::Any, WireValue::String(s)) => HostValue::String(s.clone()),
            (TargetType::Any, WireValue::Date(millis)) => HostValue::Date(to_date(*millis)?),
            (TargetType::Any, WireValue::ByteArray(bytes)) => HostValue::Bytes(bytes.clone()),
            (TargetType::Any | TargetType::Xml, WireValue::Xml(s) | WireValue::XmlDocument(s)) => {
                self.xml(s)?
            }
            (TargetType::Xml, WireValue::String(s)) => self.xml(s)?,

            (TargetType::Bool, WireValue::Bool(b)) => HostValue::Bool(*b),
            (TargetType::Bool, WireValue::Integer(i)) => HostValue::Bool(*i != 0),
            (TargetType::Bool, WireValue::Double(d)) => HostValue::Bool(*d != 0.0 && !d.is_nan()),
            (TargetType::Bool, WireValue::String(s)) => HostValue::Bool(s.eq_ignore_ascii_case("true")),

            (TargetType::Int, WireValue::Integer(i)) => HostValue::Int(*i),
            (TargetType::Int, WireValue::Double(d)) => HostValue::Int(double_to_int(*d, "int", i32::MIN as f64, i32::MAX as f64)? as i32),
            (TargetType::Int, WireValue::Bool(b)) => HostValue::Int(*b as i32),
            (TargetType::Int, WireValue::String(s)) => HostValue::Int(parse(s, "int")?),

            (TargetType::Long, WireValue::Integer(i)) => HostValue::Long(*i as i64),
            (TargetType::Long, WireValue::Double(d)) => HostValue::Long(double_to_int(*d, "long", i64::MIN as f64, i64::MAX as f64)?),
            (TargetType::Long, WireValue::Bool(b)) => HostValue::Long(*b as i64),
            (TargetType::Long, WireValue::String(s)) => HostValue::Long(parse(s, "long")?),

            (TargetType::Double, WireValue::Integer(i)) => HostValue::Double(*i as f64),
            (TargetType::Double, WireValue::Double(d)) => HostValue::Double(*d),
            (TargetType::Double, WireValue::Date(millis)) => HostValue::Double(*millis),
            (TargetType::Double, WireValue::String(s)) => HostValue::Double(parse(s, "double")?),

            (TargetType::String, WireValue::String(s)) => HostValue::String(s.clone()),
            (TargetType::String, WireValue::Integer(i)) => HostValue::String(i.to_string()),
            (TargetType::String, WireValue::Double(d)) => HostValue::String(d.to_string()),
            (TargetType::String, WireValue::Bool(b)) => HostValue::String(b.to_string()),

            (TargetType::Date, WireValue::Date(millis)) => HostValue::Date(to_date(*millis)?),
            (TargetType::Date, WireValue::Double(millis)) => HostValue::Date(to_date(*millis)?),
            (TargetType::Date, WireValue::Integer(millis)) => HostValue::Date(to_date(*millis as f64)?),

            (TargetType::Bytes, WireValue::ByteArray(bytes)) => HostValue::Bytes(bytes.clone()),

            (TargetType::Enum { type_name, constants }, WireValue::String(s)) => {
                if !constants.iter().any(|c| c == s) {
                    return Err(TranslationError::InvalidValue {
                        type_name: type_name.clone(),
                        reason: format!("no constant named '{}'", s),
                    }
                    .into());
                }
                HostValue::Enum {
                    type_name: type_name.clone(),
                    constant: s.clone(),
                }
            }

            _ => return Err(unsupported()),
        };
        Ok(host)
    }

    fn xml(&self, text: &str) -> Result<HostValue> {
        if !self.config().allow_xml {
            return Err(TranslationError::XmlNotAllowed.into());
        }
        Ok(HostValue::Xml(text.to_string()))
    }

    fn translate_node(&mut self, id: NodeId, target: &TargetType) -> Result<HostValue> {
        if let Some(existing) = self.identities.get(&id) {
            return Ok(existing.clone());
        }

        let graph = self.graph;
        let node = graph
            .node(id)
            .ok_or(TranslationError::DanglingNode(id.index()))?;

        let unsupported = || -> Error {
            TranslationError::UnsupportedConversion {
                from: node.kind_name(),
                to: target.to_string(),
            }
            .into()
        };

        match (node, target) {
            (Node::Array(array), TargetType::Map(value_type)) => {
                let mut entries = Vec::with_capacity(array.dense.len() + array.associative.len());
                for (index, value) in array.dense.iter().enumerate() {
                    entries.push((index.to_string(), value));
                }
                for (key, value) in &array.associative {
                    entries.push((key.clone(), value));
                }
                self.build_map(id, entries, value_type)
            }
            (Node::Array(array), TargetType::Any) if array.is_ecma() => {
                let mut entries = Vec::with_capacity(array.dense.len() + array.associative.len());
                for (index, value) in array.dense.iter().enumerate() {
                    entries.push((index.to_string(), value));
                }
                for (key, value) in &array.associative {
                    entries.push((key.clone(), value));
                }
                self.build_map(id, entries, &TargetType::Any)
            }
            (Node::Array(array), TargetType::Any) => self.build_list(id, &array.dense, &TargetType::Any),
            (Node::Array(array), TargetType::List(element)) => {
                if !array.associative.is_empty() {
                    tracing::debug!(
                        dropped = array.associative.len(),
                        "Associative entries ignored for list target"
                    );
                }
                self.build_list(id, &array.dense, element)
            }

            (Node::Dictionary(dictionary), TargetType::Any | TargetType::Map(_)) => {
                let value_type = match target {
                    TargetType::Map(value_type) => value_type.as_ref(),
                    _ => &TargetType::Any,
                };
                self.build_dictionary(id, &dictionary.entries, value_type)
            }

            (Node::Vector(vector), TargetType::Any | TargetType::List(_)) => {
                let element = match target {
                    TargetType::List(element) => element.as_ref(),
                    _ => &TargetType::Any,
                };
                let items: Vec<WireValue> = match &vector.items {
                    VectorItems::Int(items) => items.iter().map(|v| WireValue::Integer(*v)).collect(),
                    VectorItems::Uint(items) => items.iter().map(|v| WireValue::Double(*v as f64)).collect(),
                    VectorItems::Double(items) => items.iter().map(|v| WireValue::Double(*v)).collect(),
                    VectorItems::Object { items, .. } => items.clone(),
                };
                self.build_list(id, &items, element)
            }

            (Node::Object(object), TargetType::Any | TargetType::Class(_) | TargetType::Map(_)) => {
                self.translate_object(id, object, target)
            }

            (Node::Shared(shared), _) => self.translate_value(&shared.to_wire(), target),

            _ => Err(unsupported()),
        }
    }

    fn check_creation(&self, type_name: &str) -> Result<()> {
        if !self.validator().validate_creation(type_name) {
            tracing::debug!(type_name, "Creation rejected");
            return Err(TranslationError::CreationRejected {
                type_name: type_name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Ask the validator about one assignment; record it when declined
    fn check_assignment(
        &mut self,
        type_name: &str,
        instance: &HostValue,
        key: PropertyKey,
        value: &HostValue,
    ) -> Option<PropertyKey> {
        if self.validator().validate_assignment(instance, &key, value) {
            return Some(key);
        }
        tracing::warn!(type_name, key = %key, "Assignment rejected");
        self.rejected.push(RejectedAssignment {
            type_name: type_name.to_string(),
            key,
        });
        None
    }

    /// Translate a collection element, applying the unknown type policy
    fn translate_element(&mut self, value: &WireValue, target: &TargetType) -> Result<HostValue> {
        match self.translate(value, target) {
            Err(Error::Translation(TranslationError::UnknownType { type_name }))
                if self.config().unknown_type_policy == UnknownTypePolicy::SubstituteNull =>
            {
                tracing::debug!(type_name = %type_name, "Unknown element type replaced by null");
                Ok(HostValue::Null)
            }
            other => other,
        }
    }

    fn build_list(&mut self, id: NodeId, items: &[WireValue], element: &TargetType) -> Result<HostValue> {
        self.check_creation(LIST_TYPE)?;

        let list = HostList::new(vec![HostValue::Null; items.len()]);
        let shell = HostValue::List(list.clone());
        self.identities.insert(id, shell.clone());

        for (index, item) in items.iter().enumerate() {
            let value = self.translate_element(item, element)?;
            if self
                .check_assignment(LIST_TYPE, &shell, PropertyKey::Index(index), &value)
                .is_some()
            {
                list.borrow_mut()[index] = value;
            }
        }
        Ok(shell)
    }

    fn build_map(&mut self, id: NodeId, entries: Vec<(String, &WireValue)>, value_type: &TargetType) -> Result<HostValue> {
        self.check_creation(MAP_TYPE)?;

        let map = HostMap::new();
        let shell = HostValue::Map(map.clone());
        self.identities.insert(id, shell.clone());

        for (key, item) in entries {
            let value = self.translate_element(item, value_type)?;
            if self
                .check_assignment(MAP_TYPE, &shell, PropertyKey::Name(key.clone()), &value)
                .is_some()
            {
                map.insert(HostValue::String(key), value);
            }
        }
        Ok(shell)
    }

    fn build_dictionary(
        &mut self,
        id: NodeId,
        entries: &[(WireValue, WireValue)],
        value_type: &TargetType,
    ) -> Result<HostValue> {
        self.check_creation(MAP_TYPE)?;

        let map = HostMap::new();
        let shell = HostValue::Map(map.clone());
        self.identities.insert(id, shell.clone());

        for (key, item) in entries {
            let key = self.translate_element(key, &TargetType::Any)?;
            let value = self.translate_element(item, value_type)?;
            if self
                .check_assignment(MAP_TYPE, &shell, key_label(&key), &value)
                .is_some()
            {
                map.insert(key, value);
            }
        }
        Ok(shell)
    }

    fn translate_object(&mut self, id: NodeId, object: &WireObject, target: &TargetType) -> Result<HostValue> {
        let graph = self.graph;
        let traits = graph.object_traits(object)?;

        // Collection proxies stand for the value they wrap
        if traits.is_externalizable() && is_proxy_type(traits.type_name()) {
            let inner = object.members.first().unwrap_or(&WireValue::Null);
            let value = self.translate(inner, target)?;
            self.identities.insert(id, value.clone());
            return Ok(value);
        }

        if let TargetType::Map(value_type) = target {
            let entries: Vec<(String, &WireValue)> = traits
                .members()
                .iter()
                .cloned()
                .zip(object.members.iter())
                .chain(object.dynamic_members.iter().map(|(k, v)| (k.clone(), v)))
                .collect();
            return self.build_map(id, entries, value_type);
        }

        let alias = match target {
            TargetType::Class(alias) if traits.is_anonymous() => alias.as_str(),
            _ => traits.type_name(),
        };

        let instance = if alias.is_empty() {
            self.check_creation(AS_OBJECT_TYPE)?;
            Box::new(AsObject::new())
        } else {
            self.check_creation(alias)?;
            match self.translator.classes.create(alias) {
                Some(instance) => instance,
                None if self.config().create_as_object_for_missing_type && !traits.is_externalizable() => {
                    tracing::debug!(type_name = alias, "Unregistered type materialized as AsObject");
                    Box::new(AsObject::typed(alias))
                }
                None => {
                    return Err(TranslationError::UnknownType {
                        type_name: alias.to_string(),
                    }
                    .into())
                }
            }
        };

        let shell = HostObject::from_box(instance);
        let shell_value = HostValue::Object(shell.clone());
        self.identities.insert(id, shell_value.clone());

        if traits.is_externalizable() {
            let mut values = Vec::with_capacity(object.members.len());
            for member in &object.members {
                values.push(self.translate(member, &TargetType::Any)?);
            }
            shell.borrow_mut().read_external(values)?;
        } else {
            let sealed = traits.members().iter().zip(object.members.iter());
            let dynamic = object.dynamic_members.iter().map(|(k, v)| (k, v));
            for (name, member) in sealed.chain(dynamic) {
                self.assign_property(alias, &shell, &shell_value, name, member)?;
            }
        }

        let replacement = shell.borrow_mut().complete()?;
        if let Some(instance) = replacement {
            shell.replace(instance);
        }
        Ok(shell_value)
    }

    fn assign_property(
        &mut self,
        alias: &str,
        shell: &HostObject,
        shell_value: &HostValue,
        name: &str,
        member: &WireValue,
    ) -> Result<()> {
        let target = shell.borrow().property_type(name);
        let value = self.translate_element(member, &target)?;

        let Some(key) = self.check_assignment(alias, shell_value, PropertyKey::Name(name.to_string()), &value) else {
            return Ok(());
        };

        let assigned = shell.borrow_mut().set_property(name, value);
        match assigned {
            Ok(()) => Ok(()),
            Err(err) if self.config().ignore_property_errors => {
                tracing::debug!(type_name = alias, property = %key, error = %err, "Property skipped");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Validator key for a dictionary entry
fn key_label(key: &HostValue) -> PropertyKey {
    match key {
        HostValue::String(s) => PropertyKey::Name(s.clone()),
        HostValue::Int(i) if *i >= 0 => PropertyKey::Index(*i as usize),
        other => PropertyKey::Name(format!("{:?}", other)),
    }
}

fn to_date(millis: f64) -> Result<OffsetDateTime> {
    let invalid = || -> Error {
        TranslationError::InvalidValue {
            type_name: "date".to_string(),
            reason: format!("{} ms is out of range", millis),
        }
        .into()
    };
    if !millis.is_finite() {
        return Err(invalid());
    }
    let nanos = (millis * 1_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| invalid())
}

fn double_to_int(value: f64, type_name: &str, min: f64, max: f64) -> Result<i64> {
    if !value.is_finite() || value < min || value > max {
        return Err(TranslationError::InvalidValue {
            type_name: type_name.to_string(),
            reason: format!("{} does not fit", value),
        }
        .into());
    }
    Ok(value.trunc() as i64)
}

fn parse<T: std::str::FromStr>(s: &str, type_name: &str) -> Result<T> {
    s.trim().parse().map_err(|_| {
        TranslationError::InvalidValue {
            type_name: type_name.to_string(),
            reason: format!("cannot parse '{}'", s),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::{Traits, WireArray, WireDictionary};
    use crate::validator::ClassDeserializationValidator;
    use std::any::Any;

    #[derive(Debug, Default)]
    struct Account {
        id: i32,
        password: String,
        owner: Option<HostValue>,
    }

    impl crate::translator::RemoteClass for Account {
        fn type_name(&self) -> &str {
            "com.example.Account"
        }

        fn property_names(&self) -> Vec<String> {
            vec!["id".into(), "password".into(), "owner".into()]
        }

        fn property_type(&self, name: &str) -> TargetType {
            match name {
                "id" => TargetType::Int,
                "password" => TargetType::String,
                _ => TargetType::Any,
            }
        }

        fn get_property(&self, name: &str) -> Option<HostValue> {
            match name {
                "id" => Some(HostValue::Int(self.id)),
                "password" => Some(HostValue::String(self.password.clone())),
                "owner" => Some(self.owner.clone().unwrap_or(HostValue::Null)),
                _ => None,
            }
        }

        fn set_property(&mut self, name: &str, value: HostValue) -> std::result::Result<(), TranslationError> {
            match (name, value) {
                ("id", HostValue::Int(id)) => self.id = id,
                ("password", HostValue::String(p)) => self.password = p,
                ("owner", value) => self.owner = Some(value),
                (name, _) => {
                    return Err(TranslationError::UnknownProperty {
                        type_name: "com.example.Account".into(),
                        property: name.into(),
                    })
                }
            }
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct DenyPassword;

    impl DeserializationValidator for DenyPassword {
        fn validate_creation(&self, _type_name: &str) -> bool {
            true
        }

        fn validate_assignment(&self, _instance: &HostValue, key: &PropertyKey, _value: &HostValue) -> bool {
            key.as_name() != Some("password")
        }
    }

    fn translator(validator: Arc<dyn DeserializationValidator>, config: TranslatorConfig) -> TypeTranslator {
        let mut classes = ClassRegistry::new();
        classes.register::<Account>("com.example.Account");
        TypeTranslator::new(config, Arc::new(classes), validator)
    }

    fn account_payload(extra: Vec<(String, WireValue)>) -> Payload {
        let mut graph = ObjectGraph::new();
        let mut members = vec![
            ("id".to_string(), WireValue::Integer(1)),
            ("password".to_string(), "x".into()),
        ];
        members.extend(extra);
        let root = graph.add_typed_object("com.example.Account", members).unwrap();
        Payload::new(graph, root)
    }

    #[test]
    fn test_scalars_any() {
        let translator = TypeTranslator::default();
        let value = translator
            .translate(&Payload::scalar(WireValue::Integer(5)), &TargetType::Any)
            .unwrap();
        assert_eq!(value, HostValue::Int(5));

        let value = translator
            .translate(&Payload::scalar(WireValue::Undefined), &TargetType::Int)
            .unwrap();
        assert_eq!(value, HostValue::Null);

        let value = translator
            .translate(&Payload::scalar(WireValue::Date(1000.0)), &TargetType::Date)
            .unwrap();
        assert_eq!(value, HostValue::Date(OffsetDateTime::from_unix_timestamp(1).unwrap()));
    }

    #[test]
    fn test_numeric_conversions() {
        let translator = TypeTranslator::default();
        let payload = Payload::scalar(WireValue::Double(42.9));
        assert_eq!(translator.translate(&payload, &TargetType::Int).unwrap(), HostValue::Int(42));
        assert_eq!(translator.translate(&payload, &TargetType::Long).unwrap(), HostValue::Long(42));

        let err = translator
            .translate(&Payload::scalar(WireValue::Double(f64::NAN)), &TargetType::Int)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedInput);

        let err = translator
            .translate(&Payload::scalar("abc".into()), &TargetType::Int)
            .unwrap_err();
        assert!(matches!(err, Error::Translation(TranslationError::InvalidValue { .. })));
    }

    #[test]
    fn test_enum_constant() {
        let translator = TypeTranslator::default();
        let target = TargetType::enumeration("com.example.Color", &["RED", "GREEN"]);
        let value = translator.translate(&Payload::scalar("RED".into()), &target).unwrap();
        assert_eq!(
            value,
            HostValue::Enum {
                type_name: "com.example.Color".into(),
                constant: "RED".into()
            }
        );
        assert!(translator.translate(&Payload::scalar("BLUE".into()), &target).is_err());
    }

    #[test]
    fn test_xml_gate() {
        let payload = Payload::scalar(WireValue::XmlDocument("<a/>".into()));
        let err = TypeTranslator::default()
            .translate(&payload, &TargetType::Any)
            .unwrap_err();
        assert_eq!(err, Error::Translation(TranslationError::XmlNotAllowed));

        let translator = translator(Arc::new(NoopValidator), TranslatorConfig::default().allow_xml(true));
        assert_eq!(
            translator.translate(&payload, &TargetType::Any).unwrap(),
            HostValue::Xml("<a/>".into())
        );
    }

    #[test]
    fn test_registered_class() {
        let translator = translator(Arc::new(NoopValidator), TranslatorConfig::default());
        let value = translator
            .translate(&account_payload(Vec::new()), &TargetType::Any)
            .unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.with(|a: &Account| (a.id, a.password.clone())), Some((1, "x".to_string())));
    }

    #[test]
    fn test_creation_rejected() {
        let validator = ClassDeserializationValidator::new();
        validator.add_deny_pattern(r"com\.evil\.Gadget").unwrap();
        let translator = translator(Arc::new(validator), TranslatorConfig::default().create_as_object_for_missing_type(true));

        let mut graph = ObjectGraph::new();
        let gadget = graph.add_typed_object("com.evil.Gadget", Vec::new()).unwrap();
        let root = graph.add_array(WireArray::dense(vec![gadget]));
        let err = translator
            .translate(&Payload::new(graph, root), &TargetType::Any)
            .unwrap_err();
        assert_eq!(
            err,
            Error::Translation(TranslationError::CreationRejected {
                type_name: "com.evil.Gadget".into()
            })
        );
    }

    #[test]
    fn test_assignment_rejected_is_skipped() {
        let translator = translator(Arc::new(DenyPassword), TranslatorConfig::default());
        let report = translator
            .translate_with_report(&account_payload(Vec::new()), &TargetType::Any)
            .unwrap();

        let object = report.value.as_object().unwrap();
        assert_eq!(object.with(|a: &Account| a.id), Some(1));
        assert_eq!(object.with(|a: &Account| a.password.clone()), Some(String::new()));
        assert_eq!(
            report.rejected,
            vec![RejectedAssignment {
                type_name: "com.example.Account".into(),
                key: PropertyKey::from("password"),
            }]
        );
    }

    #[test]
    fn test_unknown_type() {
        let translator = TypeTranslator::default();
        let mut graph = ObjectGraph::new();
        let root = graph.add_typed_object("com.example.Missing", Vec::new()).unwrap();
        let payload = Payload::new(graph, root);
        let err = translator.translate(&payload, &TargetType::Any).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnknownType);

        let fallback = TypeTranslator::new(
            TranslatorConfig::default().create_as_object_for_missing_type(true),
            Arc::new(ClassRegistry::new()),
            Arc::new(NoopValidator),
        );
        let value = fallback.translate(&payload, &TargetType::Any).unwrap();
        assert_eq!(value.as_object().unwrap().type_name(), "com.example.Missing");
    }

    #[test]
    fn test_unknown_element_policy() {
        let mut graph = ObjectGraph::new();
        let missing = graph.add_typed_object("com.example.Missing", Vec::new()).unwrap();
        let root = graph.add_array(WireArray::dense(vec![WireValue::Integer(1), missing]));
        let payload = Payload::new(graph, root);

        assert!(TypeTranslator::default().translate(&payload, &TargetType::Any).is_err());

        let lenient = TypeTranslator::new(
            TranslatorConfig::default().unknown_type_policy(UnknownTypePolicy::SubstituteNull),
            Arc::new(ClassRegistry::new()),
            Arc::new(NoopValidator),
        );
        let value = lenient.translate(&payload, &TargetType::Any).unwrap();
        let list = value.as_list().unwrap();
        assert_eq!(list.get(0), Some(HostValue::Int(1)));
        assert_eq!(list.get(1), Some(HostValue::Null));
    }

    #[test]
    fn test_cycle_keeps_identity() {
        let mut graph = ObjectGraph::new();
        let root = graph.add_dynamic_object(Vec::new());
        let id = root.as_node().unwrap();
        graph
            .object_mut(id)
            .unwrap()
            .dynamic_members
            .push(("me".into(), root.clone()));

        let value = TypeTranslator::default()
            .translate(&Payload::new(graph, root), &TargetType::Any)
            .unwrap();
        let object = value.as_object().unwrap();
        let me = object.get("me").unwrap();
        assert!(me.as_object().unwrap().ptr_eq(object));

        // Break the cycle so the test does not leak
        object.borrow_mut().set_property("me", HostValue::Null).unwrap();
    }

    #[test]
    fn test_shared_list_identity() {
        let mut graph = ObjectGraph::new();
        let shared = graph.add_array(WireArray::dense(vec![WireValue::Integer(1)]));
        let root = graph.add_array(WireArray::dense(vec![shared.clone(), shared]));
        let value = TypeTranslator::default()
            .translate(&Payload::new(graph, root), &TargetType::list(TargetType::list(TargetType::Long)))
            .unwrap();

        let outer = value.as_list().unwrap();
        let first = outer.get(0).unwrap();
        let second = outer.get(1).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_list().unwrap().get(0), Some(HostValue::Long(1)));
    }

    #[test]
    fn test_ecma_array_and_dictionary_become_maps() {
        let mut graph = ObjectGraph::new();
        let array = graph.add_array(WireArray {
            associative: vec![("k".into(), "v".into())],
            dense: vec![WireValue::Bool(true)],
        });
        let dictionary = graph.add_dictionary(WireDictionary {
            weak_keys: false,
            entries: vec![(WireValue::Integer(7), array.clone())],
        });

        let value = TypeTranslator::default()
            .translate(&Payload::new(graph, dictionary), &TargetType::Any)
            .unwrap();
        let outer = value.as_map().unwrap();
        let inner = outer.get(&HostValue::Int(7)).unwrap();
        let inner = inner.as_map().unwrap();
        assert_eq!(inner.get_str("0"), Some(HostValue::Bool(true)));
        assert_eq!(inner.get_str("k"), Some(HostValue::String("v".into())));
    }

    #[test]
    fn test_proxy_is_unwrapped() {
        let mut graph = ObjectGraph::new();
        let inner = graph.add_array(WireArray::dense(vec!["a".into()]));
        let traits = graph
            .traits_mut()
            .insert(Traits::externalizable(crate::amf::external::ARRAY_COLLECTION_TYPE));
        let id = graph.push(Node::Object(WireObject {
            traits,
            members: vec![inner],
            dynamic_members: Vec::new(),
        }));

        let value = TypeTranslator::default()
            .translate(&Payload::new(graph, WireValue::Node(id)), &TargetType::list(TargetType::String))
            .unwrap();
        assert_eq!(value.as_list().unwrap().get(0), Some(HostValue::String("a".into())));
    }

    #[test]
    fn test_object_as_map_target() {
        let payload = account_payload(Vec::new());
        let value = TypeTranslator::default()
            .translate(&payload, &TargetType::map(TargetType::Any))
            .unwrap();
        assert_eq!(value.as_map().unwrap().get_str("id"), Some(HostValue::Int(1)));
    }

    #[test]
    fn test_property_errors() {
        let payload = account_payload(vec![("bogus".into(), WireValue::Null)]);
        let lenient = translator(Arc::new(NoopValidator), TranslatorConfig::default());
        assert!(lenient.translate(&payload, &TargetType::Any).is_ok());

        let strict = translator(Arc::new(NoopValidator), TranslatorConfig::default().ignore_property_errors(false));
        let err = strict.translate(&payload, &TargetType::Any).unwrap_err();
        assert!(matches!(err, Error::Translation(TranslationError::UnknownProperty { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let mut graph = ObjectGraph::new();
        let mut value = graph.add_array(WireArray::default());
        for _ in 0..5 {
            value = graph.add_array(WireArray::dense(vec![value]));
        }
        let translator = TypeTranslator::new(
            TranslatorConfig::default().max_depth(3),
            Arc::new(ClassRegistry::new()),
            Arc::new(NoopValidator),
        );
        let err = translator.translate(&Payload::new(graph, value), &TargetType::Any).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::LimitExceeded);
    }
}
