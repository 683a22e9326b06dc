// Esquema Diesel del catálogo (mismo para SQLite y Postgres).
// Tablas: dataset, ingest_run, discovered_molecule, molecule_geometry,
// molecule_geometry_cold
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    dataset (dataset_id) {
        dataset_id -> Text,
        name -> Text,
        ingest_run_id -> Nullable<Text>,
        created_at_ts -> BigInt,
    }
}
diesel::table! {
    ingest_run (run_id) {
        run_id -> Text,
        dataset_id -> Text,
        started_at_ts -> BigInt,
        finished_at_ts -> Nullable<BigInt>,
        status -> Text,
        stats -> Text,
    }
}
diesel::table! {
    discovered_molecule (dataset_id, cid) {
        dataset_id -> Text,
        cid -> BigInt,
        smiles -> Nullable<Text>,
        inchi_key -> Nullable<Text>,
        molecular_formula -> Nullable<Text>,
        molecular_weight -> Nullable<Double>,
        exact_mass -> Nullable<Double>,
        xlogp3 -> Nullable<Double>,
        tpsa -> Nullable<Double>,
        hba -> Nullable<Integer>,
        hbd -> Nullable<Integer>,
        rotatable_bonds -> Nullable<Integer>,
        discovery_method -> Text,
        discovery_seed -> Nullable<Text>,
        seed_name -> Nullable<Text>,
        seed_smiles -> Nullable<Text>,
        name -> Nullable<Text>,
        ingest_run_id -> Nullable<Text>,
        created_at_ts -> BigInt,
    }
}
diesel::table! {
    molecule_geometry (dataset_id, cid) {
        dataset_id -> Text,
        cid -> BigInt,
        conformer_id -> Nullable<Text>,
        mmff94_energy -> Nullable<Double>,
        conformer_rmsd -> Nullable<Double>,
        effective_rotor_count -> Nullable<Integer>,
        shape_volume -> Nullable<Double>,
        shape_selfoverlap -> Nullable<Double>,
        heavy_atom_count -> Nullable<Integer>,
        component_count -> Nullable<Integer>,
        ingest_run_id -> Nullable<Text>,
        created_at_ts -> BigInt,
    }
}
diesel::table! {
    molecule_geometry_cold (dataset_id, cid) {
        dataset_id -> Text,
        cid -> BigInt,
        molblock -> Text,
        shape_fingerprint -> Nullable<Binary>,
        pharmacophore_features -> Nullable<Binary>,
        mmff94_partial_charges -> Nullable<Binary>,
        coordinate_type -> Nullable<Binary>,
        created_at_ts -> BigInt,
    }
}
allow_tables_to_appear_in_same_query!(dataset,
                                      ingest_run,
                                      discovered_molecule,
                                      molecule_geometry,
                                      molecule_geometry_cold);
