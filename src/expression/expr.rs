//! Compiled expression nodes.
//!
//! Compilation turns typed expression trees into a graph of [`Expr`] nodes
//! that share structurally-equal subtrees. Each node carries metadata
//! computed after construction and evaluates over a selection of rows in a
//! [`DataChunk`].

use crate::cast::{CastHooks, CastOperator};
use crate::common::error::{VexelError, VexelResult};
use crate::expression::context::EvalContext;
use crate::functions::{FunctionMetadata, VectorFunction};
use crate::types::{DataChunk, LogicalType, SelectionVector, Value, Vector};
use crate::{internal_err, not_implemented_err};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Shared reference to a compiled expression node.
pub type ExprPtr = Arc<Expr>;

/// How a field reference projects its input.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSelector {
    Name(String),
    Index(usize),
}

/// Built-ins whose evaluation is not strict function application.
pub enum SpecialForm {
    And,
    Or,
    If,
    Try,
    Switch,
    Coalesce,
    Cast {
        try_cast: bool,
        hooks: Arc<dyn CastHooks>,
    },
    RowConstructor,
}

impl SpecialForm {
    pub fn name(&self) -> &'static str {
        match self {
            SpecialForm::And => "and",
            SpecialForm::Or => "or",
            SpecialForm::If => "if",
            SpecialForm::Try => "try",
            SpecialForm::Switch => "switch",
            SpecialForm::Coalesce => "coalesce",
            SpecialForm::Cast { try_cast: false, .. } => "cast",
            SpecialForm::Cast { try_cast: true, .. } => "try_cast",
            SpecialForm::RowConstructor => "row_constructor",
        }
    }
}

/// The payload of a compiled expression node.
pub enum ExprKind {
    /// A constant value.
    Constant(Value),
    /// A projection of a top-level column (no inputs) or of a row-typed
    /// input expression.
    FieldReference(FieldSelector),
    /// A compiled lambda: formal parameters, captured outer-column
    /// references and the compiled body.
    Lambda {
        signature: Vec<(String, LogicalType)>,
        captures: Vec<ExprPtr>,
        body: ExprPtr,
    },
    /// A special form.
    SpecialForm(SpecialForm),
    /// A registered scalar function.
    Function {
        function: Arc<dyn VectorFunction>,
        metadata: FunctionMetadata,
    },
}

/// Metadata computed for every compiled node after construction, and
/// recomputed when the node is promoted to multiply-referenced.
#[derive(Debug, Clone, Default)]
pub struct ExprMetadata {
    /// Same inputs always produce the same output.
    pub deterministic: bool,
    /// Deterministic and referencing no input fields; eligible for
    /// constant folding.
    pub is_constant: bool,
    /// The distinct top-level input columns this subtree reads.
    pub distinct_fields: Vec<String>,
    /// A function with default null behavior skipped null rows while
    /// evaluating this subtree.
    pub default_null_rows_skipped: bool,
    /// This node is shared by more than one use in the compiled graph.
    pub multiply_referenced: bool,
    /// Cost counter: how often this node has been evaluated.
    pub num_evaluations: u64,
}

/// A compiled expression node.
pub struct Expr {
    ty: LogicalType,
    name: String,
    inputs: Vec<ExprPtr>,
    kind: ExprKind,
    metadata: RwLock<ExprMetadata>,
    /// Memoized result for multiply-referenced nodes, keyed by the exact
    /// selection it was computed for. Reset between batches.
    memoized: RwLock<Option<(Vec<usize>, Vector)>>,
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("name", &self.name)
            .field("type", &self.ty.to_string())
            .field("inputs", &self.inputs.len())
            .finish()
    }
}

impl Expr {
    fn new(ty: LogicalType, name: String, inputs: Vec<ExprPtr>, kind: ExprKind) -> ExprPtr {
        Arc::new(Self {
            ty,
            name,
            inputs,
            kind,
            metadata: RwLock::new(ExprMetadata::default()),
            memoized: RwLock::new(None),
        })
    }

    /// A constant with the type inferred from the value.
    pub fn constant(value: Value) -> ExprPtr {
        let ty = value.get_type();
        Self::constant_typed(ty, value)
    }

    /// A constant with an explicit type.
    pub fn constant_typed(ty: LogicalType, value: Value) -> ExprPtr {
        Self::new(ty, "literal".to_string(), vec![], ExprKind::Constant(value))
    }

    /// A field reference by name.
    pub fn field(ty: LogicalType, inputs: Vec<ExprPtr>, name: impl Into<String>) -> ExprPtr {
        let name = name.into();
        Self::new(
            ty,
            name.clone(),
            inputs,
            ExprKind::FieldReference(FieldSelector::Name(name)),
        )
    }

    /// A field reference by position.
    pub fn field_at(ty: LogicalType, inputs: Vec<ExprPtr>, index: usize) -> ExprPtr {
        Self::new(
            ty,
            format!("field#{}", index),
            inputs,
            ExprKind::FieldReference(FieldSelector::Index(index)),
        )
    }

    /// A special form over the given inputs.
    pub fn special_form(form: SpecialForm, ty: LogicalType, inputs: Vec<ExprPtr>) -> ExprPtr {
        let name = form.name().to_string();
        Self::new(ty, name, inputs, ExprKind::SpecialForm(form))
    }

    /// A registered function call.
    pub fn function(
        ty: LogicalType,
        inputs: Vec<ExprPtr>,
        function: Arc<dyn VectorFunction>,
        metadata: FunctionMetadata,
        name: impl Into<String>,
    ) -> ExprPtr {
        Self::new(
            ty,
            name.into(),
            inputs,
            ExprKind::Function { function, metadata },
        )
    }

    /// A compiled lambda.
    pub fn lambda(
        ty: LogicalType,
        signature: Vec<(String, LogicalType)>,
        captures: Vec<ExprPtr>,
        body: ExprPtr,
    ) -> ExprPtr {
        Self::new(
            ty,
            "lambda".to_string(),
            vec![],
            ExprKind::Lambda {
                signature,
                captures,
                body,
            },
        )
    }

    pub fn ty(&self) -> &LogicalType {
        &self.ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[ExprPtr] {
        &self.inputs
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Whether this node is a compiled constant.
    pub fn is_constant_expr(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(_))
    }

    /// The constant payload, if this node is a constant.
    pub fn constant_value(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// The special form name, if this node is a special form.
    pub fn special_form_name(&self) -> Option<&'static str> {
        match &self.kind {
            ExprKind::SpecialForm(form) => Some(form.name()),
            _ => None,
        }
    }

    /// Snapshot of this node's metadata.
    pub fn metadata(&self) -> ExprMetadata {
        self.metadata.read().unwrap().clone()
    }

    pub fn is_multiply_referenced(&self) -> bool {
        self.metadata.read().unwrap().multiply_referenced
    }

    pub fn set_multiply_referenced(&self) {
        self.metadata.write().unwrap().multiply_referenced = true;
    }

    pub fn set_default_null_rows_skipped(&self) {
        self.metadata.write().unwrap().default_null_rows_skipped = true;
    }

    /// Forget cached evaluation state. Called between batches for shared
    /// nodes, and by the constant-folding harness.
    pub fn reset(&self) {
        *self.memoized.write().unwrap() = None;
    }

    /// Recursively reset cached evaluation state in this subtree.
    pub fn reset_recursive(&self) {
        self.reset();
        for input in &self.inputs {
            input.reset_recursive();
        }
        if let ExprKind::Lambda { body, captures, .. } = &self.kind {
            body.reset_recursive();
            for capture in captures {
                capture.reset_recursive();
            }
        }
    }

    /// Clear computed metadata ahead of a recompute. The multiply-referenced
    /// flag and cost counters survive.
    pub fn clear_metadata(&self) {
        let mut meta = self.metadata.write().unwrap();
        let multiply_referenced = meta.multiply_referenced;
        let num_evaluations = meta.num_evaluations;
        *meta = ExprMetadata {
            multiply_referenced,
            num_evaluations,
            ..ExprMetadata::default()
        };
    }

    /// Compute this node's metadata from its kind and inputs. Inputs must
    /// have their metadata computed already.
    pub fn compute_metadata(&self) {
        let mut deterministic = true;
        let mut distinct_fields: Vec<String> = Vec::new();
        let mut default_null_rows_skipped = false;

        let mut merge = |fields: &[String], into: &mut Vec<String>| {
            for field in fields {
                if !into.contains(field) {
                    into.push(field.clone());
                }
            }
        };

        match &self.kind {
            ExprKind::Constant(_) => {}
            ExprKind::FieldReference(FieldSelector::Name(name)) if self.inputs.is_empty() => {
                distinct_fields.push(name.clone());
            }
            ExprKind::FieldReference(_) => {}
            ExprKind::Function { metadata, .. } => {
                deterministic &= metadata.deterministic;
            }
            ExprKind::Lambda { captures, body, .. } => {
                let body_meta = body.metadata();
                deterministic &= body_meta.deterministic;
                for capture in captures {
                    merge(&capture.metadata().distinct_fields, &mut distinct_fields);
                }
            }
            ExprKind::SpecialForm(_) => {}
        }

        for input in &self.inputs {
            let input_meta = input.metadata();
            deterministic &= input_meta.deterministic;
            default_null_rows_skipped |= input_meta.default_null_rows_skipped;
            merge(&input_meta.distinct_fields, &mut distinct_fields);
        }

        let is_constant = deterministic
            && distinct_fields.is_empty()
            && !matches!(self.kind, ExprKind::Lambda { .. });

        let mut meta = self.metadata.write().unwrap();
        meta.deterministic = deterministic;
        meta.distinct_fields = distinct_fields;
        meta.default_null_rows_skipped |= default_null_rows_skipped;
        meta.is_constant = is_constant;
    }

    /// Evaluate this expression for the selected rows of `chunk`.
    pub fn eval(
        &self,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        self.metadata.write().unwrap().num_evaluations += 1;

        if self.is_multiply_referenced() {
            if let Some((selection, cached)) = self.memoized.read().unwrap().as_ref() {
                if selection.as_slice() == rows.as_slice() {
                    return Ok(cached.clone());
                }
            }
        }

        let result = self.eval_kind(rows, chunk, ctx)?;

        if self.is_multiply_referenced() {
            *self.memoized.write().unwrap() = Some((rows.as_slice().to_vec(), result.clone()));
        }
        Ok(result)
    }

    fn eval_kind(
        &self,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        match &self.kind {
            ExprKind::Constant(value) => {
                let mut result = ctx.ensure_writable(rows, &self.ty)?;
                if !value.is_null() {
                    for row in rows.iter() {
                        result.set_value(row, value)?;
                    }
                }
                Ok(result)
            }
            ExprKind::FieldReference(selector) => self.eval_field(selector, rows, chunk, ctx),
            ExprKind::SpecialForm(form) => self.eval_special_form(form, rows, chunk, ctx),
            ExprKind::Function { function, .. } => {
                let mut args = Vec::with_capacity(self.inputs.len());
                for input in &self.inputs {
                    args.push(input.eval(rows, chunk, ctx)?);
                }
                let skipped_before = ctx.default_null_rows_skipped();
                let result = function.apply(rows, &args, &self.ty, ctx)?;
                if !skipped_before && ctx.default_null_rows_skipped() {
                    self.metadata.write().unwrap().default_null_rows_skipped = true;
                }
                Ok(result)
            }
            ExprKind::Lambda { .. } => Err(not_implemented_err!(
                "Lambda evaluation outside a higher-order function"
            )),
        }
    }

    fn eval_field(
        &self,
        selector: &FieldSelector,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        if self.inputs.is_empty() {
            let index = match selector {
                FieldSelector::Name(name) => chunk.column_index(name).ok_or_else(|| {
                    VexelError::InvalidExpression(format!("Field not found: {}", name))
                })?,
                FieldSelector::Index(index) => *index,
            };
            return chunk
                .get_vector(index)
                .cloned()
                .ok_or_else(|| VexelError::InvalidExpression(format!("Field not found: #{}", index)));
        }

        // Projection out of a row-typed input.
        let input = self.inputs[0].eval(rows, chunk, ctx)?;
        let mut result = ctx.ensure_writable(rows, &self.ty)?;
        for row in rows.iter() {
            match input.get_value(row)? {
                Value::Null => result.set_null(row),
                Value::Row(fields) => {
                    let value = match selector {
                        FieldSelector::Name(name) => fields
                            .iter()
                            .find(|(field_name, _)| field_name == name)
                            .map(|(_, value)| value.clone()),
                        FieldSelector::Index(index) => {
                            fields.get(*index).map(|(_, value)| value.clone())
                        }
                    }
                    .ok_or_else(|| {
                        VexelError::InvalidExpression(format!(
                            "Row has no field {:?}",
                            selector
                        ))
                    })?;
                    if value.is_null() {
                        result.set_null(row);
                    } else {
                        result.set_value(row, &value)?;
                    }
                }
                other => {
                    return Err(VexelError::InvalidType(format!(
                        "Cannot project a field out of {}",
                        other.get_type()
                    )))
                }
            }
        }
        Ok(result)
    }

    fn eval_special_form(
        &self,
        form: &SpecialForm,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        match form {
            SpecialForm::And => self.eval_conjunct(rows, chunk, ctx, false),
            SpecialForm::Or => self.eval_conjunct(rows, chunk, ctx, true),
            SpecialForm::If => self.eval_if(rows, chunk, ctx),
            SpecialForm::Switch => self.eval_switch(rows, chunk, ctx),
            SpecialForm::Coalesce => self.eval_coalesce(rows, chunk, ctx),
            SpecialForm::Try => self.eval_try(rows, chunk, ctx),
            SpecialForm::Cast { try_cast, hooks } => {
                let input = self.inputs[0].eval(rows, chunk, ctx)?;
                if input.get_type().equivalent(&self.ty) {
                    return Ok(input);
                }
                CastOperator::new(hooks.clone(), *try_cast).apply(rows, &input, &self.ty, ctx)
            }
            SpecialForm::RowConstructor => self.eval_row_constructor(rows, chunk, ctx),
        }
    }

    /// N-ary AND/OR with SQL three-valued logic. `short_circuit` is the
    /// value that decides the result: false for AND, true for OR.
    fn eval_conjunct(
        &self,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
        short_circuit: bool,
    ) -> VexelResult<Vector> {
        let mut children = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            children.push(input.eval(rows, chunk, ctx)?);
        }

        let mut result = ctx.ensure_writable(rows, &LogicalType::Boolean)?;
        for row in rows.iter() {
            let mut has_null = false;
            let mut decided = false;
            for child in &children {
                match child.get_value(row)? {
                    Value::Null => has_null = true,
                    Value::Boolean(b) if b == short_circuit => {
                        result.set_value(row, &Value::Boolean(b))?;
                        decided = true;
                        break;
                    }
                    Value::Boolean(_) => {}
                    other => {
                        return Err(VexelError::InvalidType(format!(
                            "{} expects BOOLEAN inputs, got {}",
                            self.name,
                            other.get_type()
                        )))
                    }
                }
            }
            if !decided {
                if has_null {
                    result.set_null(row);
                } else {
                    result.set_value(row, &Value::Boolean(!short_circuit))?;
                }
            }
        }
        Ok(result)
    }

    fn eval_if(
        &self,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        let condition = self.inputs[0].eval(rows, chunk, ctx)?;
        let mut then_rows = SelectionVector::new(rows.count());
        let mut else_rows = SelectionVector::new(rows.count());
        for row in rows.iter() {
            match condition.get_value(row)? {
                Value::Boolean(true) => then_rows.append(row),
                Value::Boolean(false) | Value::Null => else_rows.append(row),
                other => {
                    return Err(VexelError::InvalidType(format!(
                        "if expects a BOOLEAN condition, got {}",
                        other.get_type()
                    )))
                }
            }
        }

        let mut result = ctx.ensure_writable(rows, &self.ty)?;
        if !then_rows.is_empty() {
            let values = self.inputs[1].eval(&then_rows, chunk, ctx)?;
            scatter(&values, &then_rows, &mut result)?;
        }
        match self.inputs.get(2) {
            Some(else_expr) => {
                if !else_rows.is_empty() {
                    let values = else_expr.eval(&else_rows, chunk, ctx)?;
                    scatter(&values, &else_rows, &mut result)?;
                }
            }
            None => {
                for row in else_rows.iter() {
                    result.set_null(row);
                }
            }
        }
        Ok(result)
    }

    /// switch(cond1, value1, cond2, value2, ..., [default]). Conditions are
    /// only evaluated on rows not claimed by an earlier branch.
    fn eval_switch(
        &self,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        let mut result = ctx.ensure_writable(rows, &self.ty)?;
        let pair_count = self.inputs.len() / 2;
        let default = if self.inputs.len() % 2 == 1 {
            self.inputs.last()
        } else {
            None
        };

        let mut remaining = rows.clone();
        for pair in 0..pair_count {
            if remaining.is_empty() {
                break;
            }
            let condition = self.inputs[2 * pair].eval(&remaining, chunk, ctx)?;
            let mut matched = SelectionVector::new(remaining.count());
            let mut unmatched = SelectionVector::new(remaining.count());
            for row in remaining.iter() {
                match condition.get_value(row)? {
                    Value::Boolean(true) => matched.append(row),
                    _ => unmatched.append(row),
                }
            }
            if !matched.is_empty() {
                let values = self.inputs[2 * pair + 1].eval(&matched, chunk, ctx)?;
                scatter(&values, &matched, &mut result)?;
            }
            remaining = unmatched;
        }

        if !remaining.is_empty() {
            match default {
                Some(default_expr) => {
                    let values = default_expr.eval(&remaining, chunk, ctx)?;
                    scatter(&values, &remaining, &mut result)?;
                }
                None => {
                    for row in remaining.iter() {
                        result.set_null(row);
                    }
                }
            }
        }
        Ok(result)
    }

    fn eval_coalesce(
        &self,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        let mut result = ctx.ensure_writable(rows, &self.ty)?;
        let mut remaining = rows.clone();
        for input in &self.inputs {
            if remaining.is_empty() {
                break;
            }
            let values = input.eval(&remaining, chunk, ctx)?;
            let mut still_null = SelectionVector::new(remaining.count());
            for row in remaining.iter() {
                match values.get_value(row)? {
                    Value::Null => still_null.append(row),
                    value => result.set_value(row, &value)?,
                }
            }
            remaining = still_null;
        }
        for row in remaining.iter() {
            result.set_null(row);
        }
        Ok(result)
    }

    /// TRY: user errors from the input null the affected rows; system
    /// errors propagate.
    fn eval_try(
        &self,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        let mut nested = ctx.nested();
        match self.inputs[0].eval(rows, chunk, &mut nested) {
            Ok(mut result) => {
                if nested.default_null_rows_skipped() {
                    ctx.note_default_null_row_skipped();
                }
                for (row, _) in nested.take_errors() {
                    result.set_null(row);
                }
                Ok(result)
            }
            Err(err) if err.is_user_error() => ctx.ensure_writable(rows, &self.ty),
            Err(err) => Err(err),
        }
    }

    fn eval_row_constructor(
        &self,
        rows: &SelectionVector,
        chunk: &DataChunk,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        let field_names: Vec<String> = match &self.ty {
            LogicalType::Row(fields) => fields.iter().map(|(name, _)| name.clone()).collect(),
            other => return Err(internal_err!("Row constructor with non-row type {}", other)),
        };

        let mut children = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            children.push(input.eval(rows, chunk, ctx)?);
        }

        let mut result = ctx.ensure_writable(rows, &self.ty)?;
        for row in rows.iter() {
            let mut fields = Vec::with_capacity(children.len());
            for (child, name) in children.iter().zip(field_names.iter()) {
                fields.push((name.clone(), child.get_value(row)?));
            }
            result.set_value(row, &Value::Row(fields))?;
        }
        Ok(result)
    }
}

/// Copy the values at `rows` from `src` into `dst` (same row indices).
fn scatter(src: &Vector, rows: &SelectionVector, dst: &mut Vector) -> VexelResult<()> {
    for row in rows.iter() {
        match src.get_value(row)? {
            Value::Null => dst.set_null(row),
            value => dst.set_value(row, &value)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_single(expr: &ExprPtr, chunk: &DataChunk) -> VexelResult<Vector> {
        let rows = SelectionVector::sequential(chunk.count());
        let mut ctx = EvalContext::new();
        expr.eval(&rows, chunk, &mut ctx)
    }

    fn bool_column(values: &[Option<bool>]) -> Vector {
        let values: Vec<Value> = values
            .iter()
            .map(|v| v.map(Value::Boolean).unwrap_or(Value::Null))
            .collect();
        Vector::from_values_typed(LogicalType::Boolean, &values).unwrap()
    }

    #[test]
    fn test_constant_eval() -> VexelResult<()> {
        let expr = Expr::constant(Value::integer(7));
        expr.compute_metadata();
        let chunk = DataChunk::with_rows(3);
        let result = eval_single(&expr, &chunk)?;
        for i in 0..3 {
            assert_eq!(result.get_value(i)?, Value::integer(7));
        }
        assert!(expr.metadata().is_constant);
        Ok(())
    }

    #[test]
    fn test_field_reference_eval() -> VexelResult<()> {
        let column = Vector::from_values(&[Value::integer(1), Value::integer(2)])?;
        let chunk = DataChunk::from_named_vectors(vec![("x".to_string(), column)])?;
        let expr = Expr::field(LogicalType::Integer, vec![], "x");
        expr.compute_metadata();
        let result = eval_single(&expr, &chunk)?;
        assert_eq!(result.get_value(1)?, Value::integer(2));
        assert_eq!(expr.metadata().distinct_fields, vec!["x".to_string()]);
        Ok(())
    }

    #[test]
    fn test_and_three_valued_logic() -> VexelResult<()> {
        let a = bool_column(&[Some(true), Some(true), Some(false), None]);
        let b = bool_column(&[Some(true), None, None, None]);
        let chunk = DataChunk::from_named_vectors(vec![
            ("a".to_string(), a),
            ("b".to_string(), b),
        ])?;
        let expr = Expr::special_form(
            SpecialForm::And,
            LogicalType::Boolean,
            vec![
                Expr::field(LogicalType::Boolean, vec![], "a"),
                Expr::field(LogicalType::Boolean, vec![], "b"),
            ],
        );
        let result = eval_single(&expr, &chunk)?;
        assert_eq!(result.get_value(0)?, Value::Boolean(true));
        assert!(result.get_value(1)?.is_null()); // true AND null
        assert_eq!(result.get_value(2)?, Value::Boolean(false)); // false AND null
        assert!(result.get_value(3)?.is_null());
        Ok(())
    }

    #[test]
    fn test_if_lazy_branches() -> VexelResult<()> {
        let cond = bool_column(&[Some(true), Some(false), None]);
        let chunk = DataChunk::from_named_vectors(vec![("c".to_string(), cond)])?;
        let expr = Expr::special_form(
            SpecialForm::If,
            LogicalType::Integer,
            vec![
                Expr::field(LogicalType::Boolean, vec![], "c"),
                Expr::constant(Value::integer(1)),
                Expr::constant(Value::integer(2)),
            ],
        );
        let result = eval_single(&expr, &chunk)?;
        assert_eq!(result.get_value(0)?, Value::integer(1));
        assert_eq!(result.get_value(1)?, Value::integer(2));
        assert_eq!(result.get_value(2)?, Value::integer(2)); // null condition takes else
        Ok(())
    }

    #[test]
    fn test_coalesce() -> VexelResult<()> {
        let a = Vector::from_values_typed(
            LogicalType::Integer,
            &[Value::Null, Value::integer(5), Value::Null],
        )?;
        let chunk = DataChunk::from_named_vectors(vec![("a".to_string(), a)])?;
        let expr = Expr::special_form(
            SpecialForm::Coalesce,
            LogicalType::Integer,
            vec![
                Expr::field(LogicalType::Integer, vec![], "a"),
                Expr::constant(Value::integer(0)),
            ],
        );
        let result = eval_single(&expr, &chunk)?;
        assert_eq!(result.get_value(0)?, Value::integer(0));
        assert_eq!(result.get_value(1)?, Value::integer(5));
        assert_eq!(result.get_value(2)?, Value::integer(0));
        Ok(())
    }

    #[test]
    fn test_row_constructor() -> VexelResult<()> {
        let expr = Expr::special_form(
            SpecialForm::RowConstructor,
            LogicalType::Row(vec![
                ("c0".to_string(), LogicalType::Integer),
                ("c1".to_string(), LogicalType::Varchar),
            ]),
            vec![
                Expr::constant(Value::integer(1)),
                Expr::constant(Value::varchar("a")),
            ],
        );
        let chunk = DataChunk::with_rows(1);
        let result = eval_single(&expr, &chunk)?;
        assert_eq!(
            result.get_value(0)?,
            Value::Row(vec![
                ("c0".to_string(), Value::integer(1)),
                ("c1".to_string(), Value::varchar("a")),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_memoization_keyed_on_selection() -> VexelResult<()> {
        let column = Vector::from_values(&[Value::integer(1), Value::integer(2)])?;
        let chunk = DataChunk::from_named_vectors(vec![("x".to_string(), column)])?;
        let expr = Expr::field(LogicalType::Integer, vec![], "x");
        expr.compute_metadata();
        expr.set_multiply_referenced();

        let mut ctx = EvalContext::new();
        let rows = SelectionVector::sequential(2);
        let first = expr.eval(&rows, &chunk, &mut ctx)?;
        let again = expr.eval(&rows, &chunk, &mut ctx)?;
        assert_eq!(first.get_value(1)?, again.get_value(1)?);
        assert!(expr.metadata().num_evaluations >= 2);

        expr.reset();
        let after_reset = expr.eval(&rows, &chunk, &mut ctx)?;
        assert_eq!(after_reset.get_value(0)?, Value::integer(1));
        Ok(())
    }
}
