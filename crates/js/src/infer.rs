use crate::index_io::JsIndexWriter;
use crate::model::{PropertyElement, TypeElement, OBJECT_TYPE};
use crate::scope::{Scope, Symbol, Value};
use jsindex_indexer::{IndexStore, Locator};

/// Reference chains longer than this resolve to nothing.
const MAX_REFERENCE_DEPTH: usize = 8;

/// Turns resolved scopes into typed properties.
///
/// `chain` is innermost first. Implementations may write helper types into
/// `store`, tagged with `location`.
pub trait TypeInferrer: Send + Sync {
    /// One property per symbol declared in `chain[0]`. Global-object symbols
    /// that only exist because of member assignments are left out.
    fn scope_properties(
        &self,
        chain: &[&Scope],
        store: &mut IndexStore,
        location: &Locator,
    ) -> Vec<PropertyElement>;

    /// Candidate type names of `name` as seen from `chain[0]`.
    fn symbol_types(
        &self,
        chain: &[&Scope],
        name: &str,
        store: &mut IndexStore,
        location: &Locator,
    ) -> Vec<String>;
}

/// Infers types from literal shapes alone.
///
/// A symbol with members gets a generated type named
/// `{location}#{path}@{scope start}` holding those members.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralInferrer;

impl TypeInferrer for StructuralInferrer {
    fn scope_properties(
        &self,
        chain: &[&Scope],
        store: &mut IndexStore,
        location: &Locator,
    ) -> Vec<PropertyElement> {
        let Some(scope) = chain.first() else {
            return Vec::new();
        };
        scope
            .symbols
            .iter()
            .filter(|symbol| !symbol.implicit)
            .map(|symbol| {
                let mut resolver = Resolver::new(chain, store, location);
                let types = resolver.types_of(symbol, &symbol.name, scope.start, 0);
                PropertyElement::new(symbol.name.as_str(), types)
            })
            .collect()
    }

    fn symbol_types(
        &self,
        chain: &[&Scope],
        name: &str,
        store: &mut IndexStore,
        location: &Locator,
    ) -> Vec<String> {
        let mut resolver = Resolver::new(chain, store, location);
        match resolver.lookup(name) {
            Some((symbol, start)) => resolver.types_of(symbol, name, start, 0),
            None => vec![OBJECT_TYPE.to_string()],
        }
    }
}

struct Resolver<'c, 's> {
    chain: &'c [&'c Scope],
    store: &'s mut IndexStore,
    location: &'s Locator,
}

impl<'c, 's> Resolver<'c, 's> {
    fn new(chain: &'c [&'c Scope], store: &'s mut IndexStore, location: &'s Locator) -> Self {
        Self {
            chain,
            store,
            location,
        }
    }

    fn lookup(&self, name: &str) -> Option<(&'c Symbol, usize)> {
        self.chain
            .iter()
            .find_map(|scope| scope.symbol(name).map(|symbol| (symbol, scope.start)))
    }

    fn types_of(&mut self, symbol: &Symbol, path: &str, scope_start: usize, depth: usize) -> Vec<String> {
        let mut types = Vec::new();
        for value in &symbol.values {
            for ty in self.value_types(value, depth) {
                if !types.contains(&ty) {
                    types.push(ty);
                }
            }
        }

        if !symbol.properties.is_empty() {
            let name = format!("{}#{path}@{scope_start}", self.location);
            let mut generated = TypeElement::new(name.as_str());
            if types.is_empty() {
                generated.add_parent_type(OBJECT_TYPE);
            }
            for ty in &types {
                generated.add_parent_type(ty.as_str());
            }
            for member in &symbol.properties {
                let member_path = format!("{path}.{}", member.name);
                let member_types = self.types_of(member, &member_path, scope_start, depth);
                generated.add_property(PropertyElement::new(member.name.as_str(), member_types));
            }
            if let Err(err) = JsIndexWriter.write_type(self.store, &generated, self.location) {
                log::warn!("Cannot store generated type {name}: {err}");
                return fallback(types);
            }
            return vec![name];
        }

        fallback(types)
    }

    fn value_types(&mut self, value: &Value, depth: usize) -> Vec<String> {
        let literal = match value {
            Value::Object => "Object",
            Value::Array => "Array",
            Value::Function => "Function",
            Value::String => "String",
            Value::Number => "Number",
            Value::Boolean => "Boolean",
            Value::Regex => "RegExp",
            Value::Construct(constructor) => return vec![constructor.clone()],
            Value::Reference(target) => return self.reference_types(target, depth + 1),
            Value::Null | Value::Unknown => return Vec::new(),
        };
        vec![literal.to_string()]
    }

    fn reference_types(&mut self, target: &str, depth: usize) -> Vec<String> {
        if depth > MAX_REFERENCE_DEPTH {
            log::trace!("Giving up on reference chain at {target}");
            return Vec::new();
        }
        match self.lookup(target) {
            Some((symbol, start)) => self.types_of(symbol, target, start, depth),
            None => Vec::new(),
        }
    }
}

fn fallback(types: Vec<String>) -> Vec<String> {
    if types.is_empty() {
        vec![OBJECT_TYPE.to_string()]
    } else {
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_io::JsIndexQuery;
    use crate::parser::JsParser;
    use pretty_assertions::assert_eq;

    fn infer(source: &str) -> (Vec<PropertyElement>, IndexStore) {
        let globals = JsParser::new().parse_script(source).unwrap().globals.unwrap();
        let mut store = IndexStore::new();
        let properties =
            StructuralInferrer.scope_properties(&[&globals], &mut store, &Locator::new("mem://t.js"));
        (properties, store)
    }

    fn types_of<'a>(properties: &'a [PropertyElement], name: &str) -> &'a [String] {
        &properties
            .iter()
            .find(|p| p.name == name)
            .unwrap()
            .type_names
    }

    #[test]
    fn literal_kinds() {
        let (properties, _) = infer(
            "var s = 'x', n = 1, b = true, r = /a/, a = [], f = function () {}, d = new Date(), u;",
        );
        assert_eq!(types_of(&properties, "s"), ["String"]);
        assert_eq!(types_of(&properties, "n"), ["Number"]);
        assert_eq!(types_of(&properties, "b"), ["Boolean"]);
        assert_eq!(types_of(&properties, "r"), ["RegExp"]);
        assert_eq!(types_of(&properties, "a"), ["Array"]);
        assert_eq!(types_of(&properties, "f"), ["Function"]);
        assert_eq!(types_of(&properties, "d"), ["Date"]);
        assert_eq!(types_of(&properties, "u"), ["Object"]);
    }

    #[test]
    fn references_follow_the_chain_and_cycles_stop() {
        let (properties, _) = infer("var a = 'x'; var b = a; var c = d; var d = c;");
        assert_eq!(types_of(&properties, "b"), ["String"]);
        assert_eq!(types_of(&properties, "c"), ["Object"]);
    }

    #[test]
    fn members_get_a_generated_type() {
        let (properties, store) = infer("var ns = { util: function () {}, version: '1' };");
        let generated = types_of(&properties, "ns");
        assert_eq!(generated, ["mem://t.js#ns@0"]);

        let members = JsIndexQuery::new(&store).type_members(&generated.to_vec());
        let names: Vec<(&str, &[String])> = members
            .iter()
            .map(|p| (p.name.as_str(), p.type_names.as_slice()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("util", &["Function".to_string()][..]),
                ("version", &["String".to_string()][..]),
            ]
        );
    }

    #[test]
    fn global_object_is_not_a_scope_property() {
        let (properties, _) = infer("window.x = 1; var y;");
        let names: Vec<&str> = properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["y"]);
    }

    #[test]
    fn declared_global_object_is_a_scope_property() {
        let (properties, _) = infer("var window = 'shadowed';");
        assert_eq!(types_of(&properties, "window"), ["String"]);
    }
}
