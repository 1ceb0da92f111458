use crate::{
    model::{ColumnModel, EntityModel, SizeClass, SqlType},
    traits::Entity,
    value::Value,
};

///
/// Action
///
/// Pending schema change of a model or a property.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    /// Pending action once `next` is requested on top of `current`.
    ///
    /// A delete cancels a pending create, escalates a pending update, and
    /// absorbs anything requested after it. Other combinations keep the
    /// first request.
    #[must_use]
    pub const fn merge(current: Option<Self>, next: Self) -> Option<Self> {
        match (current, next) {
            (None, next) => Some(next),
            (Some(Self::Create), Self::Delete) => None,
            (Some(Self::Update), Self::Delete) => Some(Self::Delete),
            (Some(current), _) => Some(current),
        }
    }
}

///
/// PropertyOptions
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyOptions {
    pub primary: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub nullable: bool,
    pub indexed: bool,
    pub size: SizeClass,
    pub default: Option<Value>,
}

impl PropertyOptions {
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    #[must_use]
    pub const fn size(mut self, size: SizeClass) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

///
/// MigrationProperty
///

#[derive(Clone, Debug)]
pub struct MigrationProperty {
    name: &'static str,
    ty: Option<SqlType>,
    options: PropertyOptions,
    action: Option<Action>,
    renamed_from: Option<&'static str>,
}

impl MigrationProperty {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            ty: None,
            options: PropertyOptions {
                primary: false,
                auto_increment: false,
                unique: false,
                nullable: false,
                indexed: false,
                size: SizeClass::MaxVarChar,
                default: None,
            },
            action: None,
            renamed_from: None,
        }
    }

    fn request(&mut self, action: Action) {
        self.action = Action::merge(self.action, action);
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn action(&self) -> Option<Action> {
        self.action
    }

    #[must_use]
    pub const fn ty(&self) -> Option<SqlType> {
        self.ty
    }

    #[must_use]
    pub const fn options(&self) -> &PropertyOptions {
        &self.options
    }

    #[must_use]
    pub const fn renamed_from(&self) -> Option<&'static str> {
        self.renamed_from
    }

    /// Column descriptor for a created property.
    #[must_use]
    pub fn column(&self) -> Option<ColumnModel> {
        let ty = self.ty?;
        let mut column = match ty {
            SqlType::Text => ColumnModel::text(self.name, self.options.size),
            ty => ColumnModel::scalar(self.name, ty),
        };
        column.primary = self.options.primary;
        column.auto_increment = self.options.auto_increment;
        column.unique = self.options.unique;
        column.nullable = self.options.nullable;
        column.indexed = self.options.indexed;

        Some(column)
    }
}

///
/// MigrationModel
///
/// Pending change of one entity type and its properties. Properties keep
/// declaration order.
///

#[derive(Clone, Debug)]
pub struct MigrationModel {
    model: &'static EntityModel,
    priority: u32,
    action: Option<Action>,
    renamed_from: Option<&'static str>,
    properties: Vec<MigrationProperty>,
}

impl MigrationModel {
    const fn new(model: &'static EntityModel, priority: u32) -> Self {
        Self {
            model,
            priority,
            action: None,
            renamed_from: None,
            properties: Vec::new(),
        }
    }

    fn request(&mut self, action: Action) {
        self.action = Action::merge(self.action, action);
    }

    fn property(&mut self, name: &'static str) -> &mut MigrationProperty {
        let index = match self.properties.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.properties.push(MigrationProperty::new(name));
                self.properties.len() - 1
            }
        };

        &mut self.properties[index]
    }

    pub fn add_property(
        &mut self,
        name: &'static str,
        ty: SqlType,
        options: PropertyOptions,
    ) -> &mut Self {
        let property = self.property(name);
        property.request(Action::Create);
        property.ty = Some(ty);
        property.options = options;
        self
    }

    /// Auto-incrementing integer primary key.
    pub fn add_primary(&mut self, name: &'static str) -> &mut Self {
        self.add_property(
            name,
            SqlType::BigInt,
            PropertyOptions {
                primary: true,
                auto_increment: true,
                ..PropertyOptions::default()
            },
        )
    }

    pub fn rename_property(&mut self, from: &'static str, to: &'static str) -> &mut Self {
        let property = self.property(to);
        property.request(Action::Update);
        property.renamed_from = Some(from);
        self
    }

    pub fn remove_property(&mut self, name: &'static str) -> &mut Self {
        self.property(name).request(Action::Delete);
        self
    }

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    #[must_use]
    pub const fn path(&self) -> &'static str {
        self.model.path
    }

    #[must_use]
    pub const fn table(&self) -> &'static str {
        self.model.table
    }

    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.priority
    }

    #[must_use]
    pub const fn action(&self) -> Option<Action> {
        self.action
    }

    #[must_use]
    pub const fn renamed_from(&self) -> Option<&'static str> {
        self.renamed_from
    }

    #[must_use]
    pub fn properties(&self) -> &[MigrationProperty] {
        &self.properties
    }

    /// Properties with a pending action, in declaration order.
    pub fn pending_properties(&self) -> impl Iterator<Item = &MigrationProperty> {
        self.properties.iter().filter(|p| p.action.is_some())
    }

    /// Whether anything is left to apply.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.action.is_some() || self.pending_properties().next().is_some()
    }
}

///
/// MigrationPlan
///
/// Declarations of one migration unit, keyed by entity type. Models apply
/// in the order they were first declared.
///

#[derive(Clone, Debug, Default)]
pub struct MigrationPlan {
    models: Vec<MigrationModel>,
}

impl MigrationPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn model_of(&mut self, model: &'static EntityModel) -> &mut MigrationModel {
        let index = match self.models.iter().position(|m| m.model.same(model)) {
            Some(index) => index,
            None => {
                let priority = u32::try_from(self.models.len()).unwrap_or(u32::MAX);
                self.models.push(MigrationModel::new(model, priority));
                self.models.len() - 1
            }
        };

        &mut self.models[index]
    }

    pub fn create_model<E: Entity>(&mut self) -> &mut MigrationModel {
        let model = self.model_of(E::MODEL);
        model.request(Action::Create);
        model
    }

    /// Rename the table of `E` from `old_table`.
    pub fn rename_model<E: Entity>(&mut self, old_table: &'static str) -> &mut MigrationModel {
        let model = self.model_of(E::MODEL);
        model.request(Action::Update);
        model.renamed_from = Some(old_table);
        model
    }

    pub fn delete_model<E: Entity>(&mut self) -> &mut MigrationModel {
        let model = self.model_of(E::MODEL);
        model.request(Action::Delete);
        model
    }

    /// Declare property changes without changing the model itself.
    pub fn select_model<E: Entity>(&mut self) -> &mut MigrationModel {
        self.model_of(E::MODEL)
    }

    /// Models in priority order.
    #[must_use]
    pub fn models(&self) -> &[MigrationModel] {
        &self.models
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.models.iter().any(MigrationModel::is_pending)
    }
}
