//! Namespaces and terms of the shared schema vocabularies.
//!
//! IRIs in these namespaces appear in almost every source, so they carry no
//! information about which dataset an entity belongs to.

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const DC_ELEMENTS_NS: &str = "http://purl.org/dc/elements/1.1/";
pub const DC_TERMS_NS: &str = "http://purl.org/dc/terms/";
pub const SKOS_NS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const FOAF_NS: &str = "http://xmlns.com/foaf/0.1/";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
pub const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// Namespaces ignored when voting on a dataset identifier.
pub const SHARED_VOCABULARY_NAMESPACES: &[&str] = &[
    RDF_NS,
    RDFS_NS,
    OWL_NS,
    XSD_NS,
    DC_ELEMENTS_NS,
    DC_TERMS_NS,
    SKOS_NS,
    FOAF_NS,
];

/// `true` when `iri` lives in one of [`SHARED_VOCABULARY_NAMESPACES`].
pub fn is_shared_vocabulary(iri: &str) -> bool {
    SHARED_VOCABULARY_NAMESPACES
        .iter()
        .any(|ns| iri.starts_with(ns))
}

/// `true` when `class` is a schema-level type (its instances are classes or
/// properties, not data).
pub fn is_schema_type(class: &str) -> bool {
    class.starts_with(RDF_NS) || class.starts_with(RDFS_NS) || class.starts_with(OWL_NS)
}

/// `true` when `class` marks its subject as a class.
pub fn is_class_type(class: &str) -> bool {
    class == OWL_CLASS || class == RDFS_CLASS
}
