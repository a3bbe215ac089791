//! FHIR Medication mapping.

use crate::coding::{extract_coding, optional_concept, CodedValue, CodingDefaults, RXNORM, SNOMED};
use crate::datatypes::{non_empty, CodeableConcept, Quantity, Ratio, Reference};
use crate::mapper::{wire_resource, ResourceMapper, WriteMode};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::reference::{optional_reference, optional_reference_id, ORGANIZATION};
use crate::validation::Validator;
use medrec_types::ListRequest;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MedicationData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// Medication code (RxNorm by default).
    pub code: String,
    /// Display text of `code`.
    pub display: String,
    /// Coding system of `code`.
    pub system: String,

    /// `active`, `inactive`, `entered-in-error`.
    pub status: String,
    /// Organization id.
    pub manufacturer: Option<String>,
    /// Dose form (tablet, capsule, ...).
    pub form: CodedValue,

    /// Ingredients, in wire order.
    pub ingredients: Vec<IngredientData>,

    /// `batch.lotNumber`.
    pub lot_number: String,
    /// `batch.expirationDate`.
    pub expiration_date: String,
}

/// One coded ingredient with the numerator of its strength.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IngredientData {
    /// Ingredient substance or medication code.
    pub item: CodedValue,
    /// Whether this is an active ingredient.
    pub is_active: Option<bool>,
    /// Strength numerator value.
    pub strength_value: Option<f64>,
    /// Strength numerator unit.
    pub strength_unit: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MedicationFilters {
    pub status: Option<String>,
    pub code: Option<String>,
    pub form: Option<String>,
    pub manufacturer_id: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MedicationWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ingredient: Vec<IngredientWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchWire>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngredientWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_codeable_concept: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<Ratio>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
}

wire_resource!(MedicationWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct MedicationMapper;

impl ResourceMapper for MedicationMapper {
    const RESOURCE_TYPE: &'static str = "Medication";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] =
        &[("code", "code"), ("status", "status"), ("form", "form")];

    type Wire = MedicationWire;
    type Record = MedicationData;
    type Filters = MedicationFilters;

    fn from_fhir(wire: &MedicationWire) -> MedicationData {
        let code = extract_coding(wire.code.as_ref(), CodingDefaults::system(RXNORM));
        let batch = wire.batch.as_ref();

        MedicationData {
            id: wire.id.clone(),
            code: code.code,
            display: code.display,
            system: code.system,
            status: wire.status.clone().unwrap_or_default(),
            manufacturer: optional_reference_id(wire.manufacturer.as_ref(), ORGANIZATION),
            form: extract_coding(wire.form.as_ref(), CodingDefaults::system(SNOMED)),
            ingredients: wire.ingredient.iter().map(ingredient_from_wire).collect(),
            lot_number: batch.and_then(|b| b.lot_number.clone()).unwrap_or_default(),
            expiration_date: batch
                .and_then(|b| b.expiration_date.clone())
                .unwrap_or_default(),
        }
    }

    fn to_fhir(record: &MedicationData, mode: WriteMode) -> MedicationWire {
        let batch = BatchWire {
            lot_number: non_empty(&record.lot_number),
            expiration_date: non_empty(&record.expiration_date),
        };
        let has_batch = batch.lot_number.is_some() || batch.expiration_date.is_some();

        MedicationWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            code: optional_concept(&CodedValue::new(
                &record.system,
                &record.code,
                &record.display,
            )),
            status: non_empty(&record.status),
            manufacturer: optional_reference(ORGANIZATION, record.manufacturer.as_deref()),
            form: optional_concept(&record.form),
            ingredient: record
                .ingredients
                .iter()
                .filter(|i| !i.item.is_empty())
                .map(ingredient_to_wire)
                .collect(),
            batch: has_batch.then_some(batch),
        }
    }

    fn map_filters(request: &ListRequest<MedicationFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("status", f.status.as_deref())
            .put("code", f.code.as_deref())
            .put("form", f.form.as_deref())
            .put("manufacturer", f.manufacturer_id.as_deref())
            .put("code:text", request.search.as_deref())
            .build()
    }

    fn validate(record: &MedicationData) -> Vec<String> {
        Validator::new()
            .require(&record.code, "Code")
            .require(&record.status, "Status")
            .check(
                record.ingredients.iter().all(|i| !i.item.is_empty()),
                "Every ingredient must have a code",
            )
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn ingredient_from_wire(ingredient: &IngredientWire) -> IngredientData {
    let numerator = ingredient
        .strength
        .as_ref()
        .and_then(|s| s.numerator.as_ref());

    IngredientData {
        item: extract_coding(
            ingredient.item_codeable_concept.as_ref(),
            CodingDefaults::system(RXNORM),
        ),
        is_active: ingredient.is_active,
        strength_value: numerator.and_then(|q| q.value),
        strength_unit: numerator.and_then(|q| q.unit.clone()),
    }
}

fn ingredient_to_wire(ingredient: &IngredientData) -> IngredientWire {
    IngredientWire {
        item_codeable_concept: optional_concept(&ingredient.item),
        is_active: ingredient.is_active,
        strength: ingredient.strength_value.map(|value| Ratio {
            numerator: Some(Quantity::ucum(
                value,
                ingredient.strength_unit.as_deref().unwrap_or_default(),
            )),
            denominator: None,
        }),
    }
}
