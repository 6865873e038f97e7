//! Class/interface/trait definitions and the runtime object they produce.
//!
//! Grounded on the shape of the teacher's `types/class.rs` (name, namespace
//! of members, base reference, method lookup) but traded its heap-id +
//! weak-subclass-registry machinery for plain `Rc` sharing: classes are
//! registered once by name in a flat `ClassRegistry` and never freed for the
//! life of a run, so ownership cycles (a class referencing its own
//! subclasses) are never a concern here.

use crate::ast::{ClassDecl, EnumDecl, InterfaceDecl, MethodDecl, Modifiers, PropertyDecl, TraitDecl, Visibility};
use crate::value::Value;
use ahash::AHashMap;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub decl: Rc<MethodDecl>,
    pub owner: String,
}

#[derive(Debug)]
pub struct ClassDef {
    pub name: String,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub modifiers: Modifiers,
    pub is_interface: bool,
    pub methods: AHashMap<String, MethodInfo>,
    pub properties: Vec<PropertyDecl>,
    pub constants: RefCell<AHashMap<String, Value>>,
    pub static_props: RefCell<AHashMap<String, Value>>,
    /// Unevaluated constant expressions, evaluated lazily on first access so
    /// `const A = B + 1` can forward-reference sibling constants.
    pub const_exprs: AHashMap<String, crate::ast::Expr>,
    pub enum_cases: Vec<(String, Option<crate::ast::Expr>)>,
    pub backing_type: Option<String>,
    /// Trait names named in `use TraitName;` composition statements, flattened
    /// into `methods` by `ClassRegistry::define_class` once every trait it
    /// names is itself already registered.
    pub used_traits: Vec<String>,
}

impl ClassDef {
    pub fn from_decl(decl: &ClassDecl) -> Self {
        let (methods, properties, constants, const_exprs, used_traits, enum_cases) =
            split_members(&decl.members, &decl.name);
        ClassDef {
            name: decl.name.clone(),
            parent: decl.extends.clone(),
            interfaces: decl.implements.clone(),
            modifiers: decl.modifiers,
            is_interface: false,
            methods,
            properties,
            constants: RefCell::new(constants),
            static_props: RefCell::new(AHashMap::default()),
            const_exprs,
            enum_cases,
            backing_type: None,
            used_traits,
        }
    }

    pub fn from_interface(decl: &InterfaceDecl) -> Self {
        let (methods, properties, constants, const_exprs, used_traits, enum_cases) = split_members(&decl.members, &decl.name);
        ClassDef {
            name: decl.name.clone(),
            parent: None,
            interfaces: decl.extends.clone(),
            modifiers: Modifiers::default(),
            is_interface: true,
            methods,
            properties,
            constants: RefCell::new(constants),
            static_props: RefCell::new(AHashMap::default()),
            const_exprs,
            enum_cases,
            backing_type: None,
            used_traits,
        }
    }

    pub fn from_trait(decl: &TraitDecl) -> Self {
        let (methods, properties, constants, const_exprs, used_traits, enum_cases) = split_members(&decl.members, &decl.name);
        ClassDef {
            name: decl.name.clone(),
            parent: None,
            interfaces: Vec::new(),
            modifiers: Modifiers::default(),
            is_interface: false,
            methods,
            properties,
            constants: RefCell::new(constants),
            static_props: RefCell::new(AHashMap::default()),
            const_exprs,
            enum_cases,
            backing_type: None,
            used_traits,
        }
    }

    pub fn from_enum(decl: &EnumDecl) -> Self {
        let (methods, properties, constants, const_exprs, used_traits, enum_cases) = split_members(&decl.members, &decl.name);
        ClassDef {
            name: decl.name.clone(),
            parent: None,
            interfaces: decl.implements.clone(),
            modifiers: Modifiers::default(),
            is_interface: false,
            methods,
            properties,
            constants: RefCell::new(constants),
            static_props: RefCell::new(AHashMap::default()),
            const_exprs,
            enum_cases,
            backing_type: decl.backing.clone(),
            used_traits,
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.get(&name.to_ascii_lowercase())
    }
}

type SplitMembers = (
    AHashMap<String, MethodInfo>,
    Vec<PropertyDecl>,
    AHashMap<String, Value>,
    AHashMap<String, crate::ast::Expr>,
    Vec<String>,
    Vec<(String, Option<crate::ast::Expr>)>,
);

fn split_members(members: &[crate::ast::ClassMember], owner: &str) -> SplitMembers {
    let mut methods = AHashMap::default();
    let mut properties = Vec::new();
    let constants = AHashMap::default();
    let mut const_exprs = AHashMap::default();
    let mut used_traits = Vec::new();
    let mut enum_cases = Vec::new();
    for m in members {
        match m {
            crate::ast::ClassMember::Method(md) => {
                methods.insert(md.name.to_ascii_lowercase(), MethodInfo { decl: Rc::new(md.clone()), owner: owner.to_string() });
            }
            crate::ast::ClassMember::Property(p) => properties.push(p.clone()),
            crate::ast::ClassMember::Const(c) => {
                const_exprs.insert(c.name.clone(), c.value.clone());
            }
            crate::ast::ClassMember::UseTrait { names, .. } => used_traits.extend(names.iter().cloned()),
            crate::ast::ClassMember::EnumCase { name, value } => enum_cases.push((name.clone(), value.clone())),
        }
    }
    (methods, properties, constants, const_exprs, used_traits, enum_cases)
}

/// Flat registry of every declared class/interface/trait/enum, looked up by
/// name. Holding `Rc<ClassDef>` means method dispatch and `instanceof`
/// walks never need to borrow the registry itself once a definition is
/// cloned out, avoiding a long-lived registry borrow across evaluation.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: AHashMap<String, Rc<ClassDef>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, def: ClassDef) {
        self.classes.insert(def.name.to_ascii_lowercase(), Rc::new(def));
    }

    /// Registers a class, first flattening the methods of every trait its
    /// `use` clauses name into its own method table — own methods win over
    /// trait methods, and later-named traits win over earlier ones, matching
    /// the usual "most specific wins" composition rule. Traits must already
    /// be registered (trait/class declarations execute top-to-bottom like
    /// any other statement, so traits are declared before the classes that
    /// use them in ordinary programs).
    pub fn define_class(&mut self, mut def: ClassDef) {
        for trait_name in def.used_traits.clone() {
            if let Some(trait_def) = self.get(&trait_name) {
                for (k, v) in &trait_def.methods {
                    def.methods.entry(k.clone()).or_insert_with(|| v.clone());
                }
                for p in &trait_def.properties {
                    if !def.properties.iter().any(|existing| existing.name == p.name) {
                        def.properties.push(p.clone());
                    }
                }
            }
        }
        self.define(def);
    }

    pub fn get(&self, name: &str) -> Option<Rc<ClassDef>> {
        self.classes.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(&name.to_ascii_lowercase())
    }

    /// Resolves a method by walking the parent chain (single inheritance);
    /// traits are flattened into `methods` at definition time so no separate
    /// lookup step is needed for them.
    pub fn resolve_method(&self, class: &str, method: &str) -> Option<(Rc<ClassDef>, MethodInfo)> {
        let mut cur = self.get(class)?;
        loop {
            if let Some(info) = cur.method(method) {
                return Some((cur.clone(), info.clone()));
            }
            match &cur.parent {
                Some(p) => cur = self.get(p)?,
                None => return None,
            }
        }
    }

    /// True if `class` is `target` or inherits from / implements it,
    /// transitively through both the parent chain and declared interfaces.
    pub fn is_subclass_of(&self, class: &str, target: &str) -> bool {
        if class.eq_ignore_ascii_case(target) {
            return true;
        }
        let Some(def) = self.get(class) else { return false };
        if def.interfaces.iter().any(|i| i.eq_ignore_ascii_case(target) || self.is_subclass_of(i, target)) {
            return true;
        }
        match &def.parent {
            Some(p) => self.is_subclass_of(p, target),
            None => false,
        }
    }

    pub fn resolve_constant(&self, class: &str, name: &str) -> Option<Value> {
        let def = self.get(class)?;
        if let Some(v) = def.constants.borrow().get(name) {
            return Some(v.clone());
        }
        if let Some(parent) = &def.parent {
            return self.resolve_constant(parent, name);
        }
        None
    }
}

/// A live object instance: a named class plus an ordered, mutable property
/// bag shared by every `Value::Object` reference that points at it.
pub struct Object {
    pub class: String,
    pub props: IndexMap<String, Value>,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self { class: class.into(), props: IndexMap::new() }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object").field("class", &self.class).field("props", &self.props.len()).finish()
    }
}

pub type ObjectRef = Rc<RefCell<Object>>;

pub fn visible(modifiers: Modifiers, from_class: Option<&str>, owner_class: &str) -> bool {
    match modifiers.visibility {
        Visibility::Public => true,
        Visibility::Protected | Visibility::Private => from_class.is_some_and(|c| c.eq_ignore_ascii_case(owner_class)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassDecl, ClassMember, MethodDecl};

    fn method(name: &str) -> ClassMember {
        ClassMember::Method(MethodDecl {
            name: name.to_string(),
            modifiers: Modifiers::default(),
            params: vec![],
            by_ref: false,
            body: Some(vec![]),
            is_generator: false,
        })
    }

    #[test]
    fn resolves_inherited_methods() {
        let mut reg = ClassRegistry::new();
        reg.define(ClassDef::from_decl(&ClassDecl {
            name: "Base".into(),
            members: vec![method("greet")],
            ..Default::default()
        }));
        reg.define(ClassDef::from_decl(&ClassDecl {
            name: "Child".into(),
            extends: Some("Base".into()),
            members: vec![],
            ..Default::default()
        }));
        let (owner, info) = reg.resolve_method("Child", "greet").unwrap();
        assert_eq!(owner.name, "Child");
        assert_eq!(info.owner, "Base");
    }

    #[test]
    fn is_subclass_of_checks_interfaces_transitively() {
        let mut reg = ClassRegistry::new();
        reg.define(ClassDef::from_decl(&ClassDecl { name: "Iterable".into(), ..Default::default() }));
        reg.define(ClassDef {
            name: "Countable".to_string(),
            interfaces: vec!["Iterable".into()],
            ..ClassDef::from_decl(&ClassDecl { name: "Countable".into(), ..Default::default() })
        });
        reg.define(ClassDef {
            name: "Collection".to_string(),
            interfaces: vec!["Countable".into()],
            ..ClassDef::from_decl(&ClassDecl { name: "Collection".into(), ..Default::default() })
        });
        assert!(reg.is_subclass_of("Collection", "Iterable"));
    }
}
