//! The type registry: entity types, root fields and mutations described as data.
//!
//! A [`Registry`] is built once at startup through [`RegistryBuilder`] and is read-only
//! afterwards. Relation fields do not carry code: each one is a [`RelationField`] descriptor
//! whose [`PathTemplate`] is rendered against the parent entity to find the remote path of
//! the related entities. This replaces a database join with a second remote call.

use std::fmt;
use std::fmt::Write as _;

use indexmap::IndexMap;
use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::CONTROLS;

use crate::error::FetchError;
use crate::error::RegistryError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;

/// Characters escaped when a value is substituted into a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The primitive kinds a scalar field or an argument can have.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScalarKind {
    String,
    Int,
}

impl ScalarKind {
    /// The GraphQL name of the scalar.
    pub fn graphql_name(&self) -> &'static str {
        match self {
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
        }
    }

    /// Whether a non-null JSON value is acceptable for this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ScalarKind::String => value.is_string(),
            ScalarKind::Int => value
                .as_i64()
                .map(|i| i32::try_from(i).is_ok())
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.graphql_name())
    }
}

/// How many entities a relation or root field yields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum TemplatePart {
    Literal(String),
    Placeholder(String),
}

/// A relative path with `{name}` placeholders, such as `companies/{id}/users`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathTemplate {
    template: String,
    parts: Vec<TemplatePart>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidPathTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = Vec::new();
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            if start > 0 {
                parts.push(TemplatePart::Literal(rest[..start].to_string()));
            }
            let end = rest[start..]
                .find('}')
                .map(|end| start + end)
                .ok_or_else(|| invalid("unterminated placeholder"))?;
            let name = &rest[start + 1..end];
            if name.is_empty() || name.contains('{') {
                return Err(invalid("placeholders must name a field"));
            }
            parts.push(TemplatePart::Placeholder(name.to_string()));
            rest = &rest[end + 1..];
        }
        if rest.contains('}') {
            return Err(invalid("unbalanced '}'"));
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Literal(rest.to_string()));
        }

        Ok(Self {
            template: template.to_string(),
            parts,
        })
    }

    /// Names referenced by the placeholders, in order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            TemplatePart::Placeholder(name) => Some(name.as_str()),
            TemplatePart::Literal(_) => None,
        })
    }

    /// Renders the path, taking placeholder values from `source`.
    ///
    /// Returns `None` when a placeholder has no usable value (absent, `null`, object or list).
    pub fn render(&self, source: &Object) -> Option<String> {
        let mut path = String::with_capacity(self.template.len());
        for part in &self.parts {
            match part {
                TemplatePart::Literal(literal) => path.push_str(literal),
                TemplatePart::Placeholder(name) => {
                    let segment = source.get(name)?.as_path_segment()?;
                    path.extend(utf8_percent_encode(&segment, PATH_SEGMENT));
                }
            }
        }
        Some(path)
    }

    /// Returns the first placeholder that `source` cannot fill, if any.
    pub fn first_missing<'a>(&'a self, source: &Object) -> Option<&'a str> {
        self.placeholders().find(|name| {
            source
                .get(*name)
                .and_then(<Value as ValueExt>::as_path_segment)
                .is_none()
        })
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// A field whose value is obtained through an additional remote fetch.
#[derive(Clone, Debug)]
pub struct RelationField {
    pub name: String,
    pub target_type: String,
    pub cardinality: Cardinality,
    /// Rendered against the parent entity.
    pub path: PathTemplate,
}

/// A named entity type.
#[derive(Clone, Debug)]
pub struct EntityType {
    pub name: String,
    pub scalar_fields: IndexMap<String, ScalarKind>,
    pub relation_fields: IndexMap<String, RelationField>,
}

impl EntityType {
    pub fn relation(&self, name: &str) -> Option<&RelationField> {
        self.relation_fields.get(name)
    }
}

/// An argument accepted by a root field or a mutation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArgumentDefinition {
    pub name: String,
    pub kind: ScalarKind,
    pub required: bool,
}

impl ArgumentDefinition {
    pub fn new(name: impl Into<String>, kind: ScalarKind, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            required,
        }
    }

    /// Checks the supplied value of this argument, if any.
    ///
    /// A missing or `null` value is an error only for required arguments.
    pub fn validate(&self, arguments: &Object) -> Result<(), FetchError> {
        match arguments.get(&self.name) {
            None | Some(Value::Null) if self.required => Err(FetchError::Validation {
                field: self.name.clone(),
            }),
            None | Some(Value::Null) => Ok(()),
            Some(value) if self.kind.accepts(value) => Ok(()),
            Some(value) => Err(FetchError::InvalidArgument {
                field: self.name.clone(),
                expected: self.kind.to_string(),
                actual: value.kind().to_string(),
            }),
        }
    }

    fn to_sdl(&self) -> String {
        format!(
            "{}: {}{}",
            self.name,
            self.kind,
            if self.required { "!" } else { "" }
        )
    }
}

/// A root query field, e.g. `user(id)` resolved through `GET users/{id}`.
#[derive(Clone, Debug)]
pub struct RootField {
    pub name: String,
    pub target_type: String,
    pub cardinality: Cardinality,
    pub arguments: Vec<ArgumentDefinition>,
    /// Rendered against the field arguments.
    pub path: PathTemplate,
}

/// The three shapes a mutation can take.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
    /// `POST` to a collection.
    Create,
    /// `PATCH` an entity with the supplied subset of its fields.
    Update,
    /// `DELETE` an entity.
    Delete,
}

/// A root mutation field.
#[derive(Clone, Debug)]
pub struct MutationField {
    pub name: String,
    pub kind: MutationKind,
    pub target_type: String,
    pub arguments: Vec<ArgumentDefinition>,
    /// Rendered against the field arguments.
    pub path: PathTemplate,
    /// Arguments copied into the request body when supplied.
    pub forwarded: Vec<String>,
}

/// The immutable set of types, root fields and mutations served by the gateway.
#[derive(Clone, Debug)]
pub struct Registry {
    types: IndexMap<String, EntityType>,
    root_fields: IndexMap<String, RootField>,
    mutations: IndexMap<String, MutationField>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The registry of the `User` / `Company` graph.
    pub fn users_and_companies() -> Result<Registry, RegistryError> {
        use Cardinality::*;
        use ScalarKind::Int;
        use ScalarKind::String as Str;

        Registry::builder()
            .entity(
                EntityDefinition::new("User")
                    .scalar("id", Str)
                    .scalar("firstName", Str)
                    .scalar("age", Int)
                    .relation("company", "Company", One, "companies/{companyId}"),
            )
            .entity(
                EntityDefinition::new("Company")
                    .scalar("id", Str)
                    .scalar("name", Str)
                    .scalar("description", Str)
                    .relation("users", "User", Many, "companies/{id}/users"),
            )
            .root_field(
                RootFieldDefinition::new("user", "User", One, "users/{id}")
                    .argument("id", Str, false),
            )
            .root_field(
                RootFieldDefinition::new("company", "Company", One, "companies/{id}")
                    .argument("id", Str, false),
            )
            // `companyId` is accepted but, as the resource service has always seen it, not
            // forwarded on creation.
            .mutation(
                MutationDefinition::new("addUser", MutationKind::Create, "User", "users")
                    .argument("firstName", Str, true)
                    .argument("age", Int, true)
                    .argument("companyId", Str, false)
                    .forward(["firstName", "age"]),
            )
            .mutation(
                MutationDefinition::new("deleteUser", MutationKind::Delete, "User", "users/{id}")
                    .argument("id", Str, true),
            )
            .mutation(
                MutationDefinition::new("editUser", MutationKind::Update, "User", "users/{id}")
                    .argument("id", Str, true)
                    .argument("firstName", Str, false)
                    .argument("age", Int, false)
                    .argument("companyId", Str, false),
            )
            .build()
    }

    pub fn resolve_type(&self, name: &str) -> Result<&EntityType, RegistryError> {
        self.types
            .get(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }

    pub fn root_field(&self, name: &str) -> Option<&RootField> {
        self.root_fields.get(name)
    }

    pub fn mutation_field(&self, name: &str) -> Option<&MutationField> {
        self.mutations.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    /// Renders the GraphQL schema served by this registry.
    pub fn to_sdl(&self) -> String {
        let mut sdl = String::new();
        for entity in self.types.values() {
            let _ = writeln!(sdl, "type {} {{", entity.name);
            for (name, kind) in &entity.scalar_fields {
                let _ = writeln!(sdl, "  {name}: {kind}");
            }
            for relation in entity.relation_fields.values() {
                let _ = writeln!(
                    sdl,
                    "  {}: {}",
                    relation.name,
                    type_reference(&relation.target_type, relation.cardinality)
                );
            }
            sdl.push_str("}\n\n");
        }

        sdl.push_str("type Query {\n");
        for field in self.root_fields.values() {
            let _ = writeln!(
                sdl,
                "  {}{}: {}",
                field.name,
                arguments_to_sdl(&field.arguments),
                type_reference(&field.target_type, field.cardinality)
            );
        }
        sdl.push_str("}\n");

        if !self.mutations.is_empty() {
            sdl.push_str("\ntype Mutation {\n");
            for field in self.mutations.values() {
                let _ = writeln!(
                    sdl,
                    "  {}{}: {}",
                    field.name,
                    arguments_to_sdl(&field.arguments),
                    field.target_type
                );
            }
            sdl.push_str("}\n");
        }
        sdl
    }
}

fn type_reference(target_type: &str, cardinality: Cardinality) -> String {
    match cardinality {
        Cardinality::One => target_type.to_string(),
        Cardinality::Many => format!("[{target_type}]"),
    }
}

fn arguments_to_sdl(arguments: &[ArgumentDefinition]) -> String {
    if arguments.is_empty() {
        return String::new();
    }
    let arguments: Vec<String> = arguments.iter().map(ArgumentDefinition::to_sdl).collect();
    format!("({})", arguments.join(", "))
}

/// Describes an entity type before validation.
#[derive(Clone, Debug)]
pub struct EntityDefinition {
    name: String,
    scalars: Vec<(String, ScalarKind)>,
    relations: Vec<(String, String, Cardinality, String)>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scalars: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn scalar(mut self, name: impl Into<String>, kind: ScalarKind) -> Self {
        self.scalars.push((name.into(), kind));
        self
    }

    pub fn relation(
        mut self,
        name: impl Into<String>,
        target_type: impl Into<String>,
        cardinality: Cardinality,
        path: impl Into<String>,
    ) -> Self {
        self.relations
            .push((name.into(), target_type.into(), cardinality, path.into()));
        self
    }
}

/// Describes a root query field before validation.
#[derive(Clone, Debug)]
pub struct RootFieldDefinition {
    name: String,
    target_type: String,
    cardinality: Cardinality,
    path: String,
    arguments: Vec<ArgumentDefinition>,
}

impl RootFieldDefinition {
    pub fn new(
        name: impl Into<String>,
        target_type: impl Into<String>,
        cardinality: Cardinality,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            cardinality,
            path: path.into(),
            arguments: Vec::new(),
        }
    }

    pub fn argument(mut self, name: impl Into<String>, kind: ScalarKind, required: bool) -> Self {
        self.arguments
            .push(ArgumentDefinition::new(name, kind, required));
        self
    }
}

/// Describes a mutation before validation.
#[derive(Clone, Debug)]
pub struct MutationDefinition {
    name: String,
    kind: MutationKind,
    target_type: String,
    path: String,
    arguments: Vec<ArgumentDefinition>,
    forwarded: Option<Vec<String>>,
}

impl MutationDefinition {
    pub fn new(
        name: impl Into<String>,
        kind: MutationKind,
        target_type: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target_type: target_type.into(),
            path: path.into(),
            arguments: Vec::new(),
            forwarded: None,
        }
    }

    pub fn argument(mut self, name: impl Into<String>, kind: ScalarKind, required: bool) -> Self {
        self.arguments
            .push(ArgumentDefinition::new(name, kind, required));
        self
    }

    /// Restricts the body to these arguments.
    ///
    /// Defaults to every argument not used by the path template.
    pub fn forward<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forwarded = Some(arguments.into_iter().map(Into::into).collect());
        self
    }
}

/// Builder for constructing an immutable [`Registry`].
#[derive(Clone, Debug, Default)]
pub struct RegistryBuilder {
    entities: Vec<EntityDefinition>,
    root_fields: Vec<RootFieldDefinition>,
    mutations: Vec<MutationDefinition>,
}

impl RegistryBuilder {
    pub fn entity(mut self, definition: EntityDefinition) -> Self {
        self.entities.push(definition);
        self
    }

    pub fn root_field(mut self, definition: RootFieldDefinition) -> Self {
        self.root_fields.push(definition);
        self
    }

    pub fn mutation(mut self, definition: MutationDefinition) -> Self {
        self.mutations.push(definition);
        self
    }

    /// Validates every definition and freezes the registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut types = IndexMap::new();
        for entity in self.entities {
            let mut scalar_fields = IndexMap::new();
            let mut relation_fields = IndexMap::new();
            for (name, kind) in entity.scalars {
                if scalar_fields.insert(name.clone(), kind).is_some() {
                    return Err(duplicate_field(&entity.name, name));
                }
            }
            for (name, target_type, cardinality, path) in entity.relations {
                if scalar_fields.contains_key(&name) || relation_fields.contains_key(&name) {
                    return Err(duplicate_field(&entity.name, name));
                }
                let relation = RelationField {
                    name: name.clone(),
                    target_type,
                    cardinality,
                    path: PathTemplate::parse(&path)?,
                };
                relation_fields.insert(name, relation);
            }
            let name = entity.name;
            if types.contains_key(&name) {
                return Err(RegistryError::DuplicateType(name));
            }
            types.insert(
                name.clone(),
                EntityType {
                    name,
                    scalar_fields,
                    relation_fields,
                },
            );
        }

        for entity in types.values() {
            for relation in entity.relation_fields.values() {
                ensure_type(&types, &relation.target_type)?;
            }
        }

        let mut root_fields = IndexMap::new();
        for field in self.root_fields {
            ensure_type(&types, &field.target_type)?;
            let path = PathTemplate::parse(&field.path)?;
            ensure_placeholders_are_arguments(&path, &field.arguments)?;
            ensure_unique_arguments("Query", &field.arguments)?;
            if root_fields.contains_key(&field.name) {
                return Err(duplicate_field("Query", field.name));
            }
            root_fields.insert(
                field.name.clone(),
                RootField {
                    name: field.name,
                    target_type: field.target_type,
                    cardinality: field.cardinality,
                    arguments: field.arguments,
                    path,
                },
            );
        }

        let mut mutations = IndexMap::new();
        for field in self.mutations {
            ensure_type(&types, &field.target_type)?;
            let path = PathTemplate::parse(&field.path)?;
            ensure_placeholders_are_arguments(&path, &field.arguments)?;
            ensure_unique_arguments("Mutation", &field.arguments)?;
            let forwarded = match field.forwarded {
                Some(forwarded) => forwarded,
                None => field
                    .arguments
                    .iter()
                    .filter(|argument| !path.placeholders().any(|name| name == argument.name))
                    .map(|argument| argument.name.clone())
                    .collect(),
            };
            if let Some(unknown) = forwarded
                .iter()
                .find(|name| !field.arguments.iter().any(|a| &a.name == *name))
            {
                return Err(RegistryError::UnknownArgument {
                    field: field.name,
                    argument: unknown.clone(),
                });
            }
            if mutations.contains_key(&field.name) {
                return Err(duplicate_field("Mutation", field.name));
            }
            mutations.insert(
                field.name.clone(),
                MutationField {
                    name: field.name,
                    kind: field.kind,
                    target_type: field.target_type,
                    arguments: field.arguments,
                    path,
                    forwarded,
                },
            );
        }

        Ok(Registry {
            types,
            root_fields,
            mutations,
        })
    }
}

fn duplicate_field(type_name: &str, field: String) -> RegistryError {
    RegistryError::DuplicateField {
        type_name: type_name.to_string(),
        field,
    }
}

fn ensure_type(types: &IndexMap<String, EntityType>, name: &str) -> Result<(), RegistryError> {
    if types.contains_key(name) {
        Ok(())
    } else {
        Err(RegistryError::UnknownType(name.to_string()))
    }
}

fn ensure_placeholders_are_arguments(
    path: &PathTemplate,
    arguments: &[ArgumentDefinition],
) -> Result<(), RegistryError> {
    match path
        .placeholders()
        .find(|name| !arguments.iter().any(|argument| argument.name == *name))
    {
        Some(name) => Err(RegistryError::InvalidPathTemplate {
            template: path.to_string(),
            reason: format!("'{name}' is not an argument"),
        }),
        None => Ok(()),
    }
}

fn ensure_unique_arguments(
    type_name: &str,
    arguments: &[ArgumentDefinition],
) -> Result<(), RegistryError> {
    for (index, argument) in arguments.iter().enumerate() {
        if arguments[..index].iter().any(|a| a.name == argument.name) {
            return Err(duplicate_field(type_name, argument.name.clone()));
        }
    }
    Ok(())
}
