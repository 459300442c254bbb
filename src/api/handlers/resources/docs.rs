//! OpenAPI entries for the generic resource routes.
//!
//! The CRUD handlers are generic, so `#[utoipa::path]` cannot describe them;
//! their operations are added to the document here instead.

use utoipa::openapi::{
    path::{HttpMethod, Operation, OperationBuilder, ParameterBuilder, ParameterIn, PathItemBuilder},
    security::SecurityRequirement,
    OpenApi, Required,
};

use super::API_PREFIX;
use crate::model::{
    Absence, AnneeScolaire, Classe, Eleve, Enseignement, Inscription, Matiere, MentionBand,
    Niveau, Note, Parent, Professeur, Resource, Semestre, Specialite, Ue,
};

pub const RESOURCES_TAG: &str = "resources";

/// Add the CRUD operations of every entity to `openapi`.
pub fn document(openapi: &mut OpenApi) {
    document_resource::<AnneeScolaire>(openapi);
    document_resource::<Niveau>(openapi);
    document_resource::<Specialite>(openapi);
    document_resource::<Classe>(openapi);
    document_resource::<Semestre>(openapi);
    document_resource::<Ue>(openapi);
    document_resource::<Matiere>(openapi);
    document_resource::<MentionBand>(openapi);
    document_resource::<Professeur>(openapi);
    document_resource::<Parent>(openapi);
    document_resource::<Eleve>(openapi);
    document_resource::<Inscription>(openapi);
    document_resource::<Enseignement>(openapi);
    document_resource::<Note>(openapi);
    document_resource::<Absence>(openapi);
}

fn document_resource<R: Resource>(openapi: &mut OpenApi) {
    let collection = PathItemBuilder::new()
        .operation(
            HttpMethod::Get,
            operation::<R>("list", format!("List {}", R::PATH), false),
        )
        .operation(
            HttpMethod::Post,
            operation::<R>("create", format!("Create one of {}", R::PATH), false),
        )
        .build();

    let item = PathItemBuilder::new()
        .operation(
            HttpMethod::Get,
            operation::<R>("show", format!("Show one of {}", R::PATH), true),
        )
        .operation(
            HttpMethod::Put,
            operation::<R>("replace", format!("Update one of {}", R::PATH), true),
        )
        .operation(
            HttpMethod::Patch,
            operation::<R>("update", format!("Partially update one of {}", R::PATH), true),
        )
        .operation(
            HttpMethod::Delete,
            operation::<R>("delete", format!("Delete one of {}", R::PATH), true),
        )
        .build();

    openapi
        .paths
        .paths
        .insert(format!("{API_PREFIX}/{}", R::PATH), collection);
    openapi
        .paths
        .paths
        .insert(format!("{API_PREFIX}/{}/{{id}}", R::PATH), item);
}

fn operation<R: Resource>(verb: &str, summary: String, with_id: bool) -> Operation {
    let mut builder = OperationBuilder::new()
        .tag(RESOURCES_TAG)
        .summary(Some(summary))
        .operation_id(Some(format!("{verb}_{}", R::TABLE)))
        .security(SecurityRequirement::new("bearer", Vec::<String>::new()));

    if with_id {
        builder = builder.parameter(
            ParameterBuilder::new()
                .name("id")
                .parameter_in(ParameterIn::Path)
                .required(Required::True)
                .description(Some("Record identifier")),
        );
    } else if verb == "list" {
        for filter in R::FILTERS {
            builder = builder.parameter(
                ParameterBuilder::new()
                    .name(*filter)
                    .parameter_in(ParameterIn::Query)
                    .required(Required::False)
                    .description(Some("Equality filter")),
            );
        }
    }

    builder.build()
}
