//! Built-in DVD rental schema catalogue.
//!
//! One description per table and view, embedded by `nl2sql index build`.
//! Descriptions name every column with its type and, for foreign keys, the
//! referenced column, so the generation prompt can write joins.

use crate::schema::{SchemaEntry, TableKind};

/// Column: name, type, note.
type Column = (&'static str, &'static str, &'static str);

struct Definition {
    name: &'static str,
    kind: TableKind,
    purpose: &'static str,
    columns: &'static [Column],
}

const DEFINITIONS: &[Definition] = &[
    Definition {
        name: "actor",
        kind: TableKind::Table,
        purpose: "Actors appearing in films.",
        columns: &[
            ("actor_id", "INTEGER", "primary key"),
            ("first_name", "VARCHAR(45)", "actor's first name"),
            ("last_name", "VARCHAR(45)", "actor's last name"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "address",
        kind: TableKind::Table,
        purpose: "Street addresses of customers, staff and stores.",
        columns: &[
            ("address_id", "INTEGER", "primary key"),
            ("address", "VARCHAR(50)", "street address"),
            ("address2", "VARCHAR(50)", "second address line, optional"),
            ("district", "VARCHAR(20)", "district or region"),
            ("city_id", "INTEGER", "references city.city_id"),
            ("postal_code", "VARCHAR(10)", "postal code, optional"),
            ("phone", "VARCHAR(20)", "contact phone number"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "category",
        kind: TableKind::Table,
        purpose: "Film genres such as Action, Comedy or Horror.",
        columns: &[
            ("category_id", "INTEGER", "primary key"),
            ("name", "VARCHAR(25)", "category name"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "city",
        kind: TableKind::Table,
        purpose: "Cities, each belonging to a country.",
        columns: &[
            ("city_id", "INTEGER", "primary key"),
            ("city", "VARCHAR(50)", "city name"),
            ("country_id", "INTEGER", "references country.country_id"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "country",
        kind: TableKind::Table,
        purpose: "Countries.",
        columns: &[
            ("country_id", "INTEGER", "primary key"),
            ("country", "VARCHAR(50)", "country name"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "customer",
        kind: TableKind::Table,
        purpose: "Customers registered at a store.",
        columns: &[
            ("customer_id", "INTEGER", "primary key"),
            ("store_id", "INTEGER", "references store.store_id, the customer's home store"),
            ("first_name", "VARCHAR(45)", "customer's first name"),
            ("last_name", "VARCHAR(45)", "customer's last name"),
            ("email", "VARCHAR(50)", "email address, optional"),
            ("address_id", "INTEGER", "references address.address_id"),
            ("active", "BOOLEAN", "whether the customer account is active"),
            ("create_date", "DATETIME", "when the customer was registered"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "film",
        kind: TableKind::Table,
        purpose: "Films available for rental, with pricing and rating.",
        columns: &[
            ("film_id", "INTEGER", "primary key"),
            ("title", "VARCHAR(255)", "film title"),
            ("description", "TEXT", "short plot summary"),
            ("release_year", "INTEGER", "year of release"),
            ("language_id", "INTEGER", "references language.language_id"),
            ("original_language_id", "INTEGER", "references language.language_id, optional"),
            ("rental_duration", "INTEGER", "rental period in days"),
            ("rental_rate", "DECIMAL(4,2)", "price to rent for the rental period"),
            ("length", "INTEGER", "running time in minutes"),
            ("replacement_cost", "DECIMAL(5,2)", "charge if the film is not returned"),
            ("rating", "VARCHAR(5)", "MPAA rating: G, PG, PG-13, R or NC-17"),
            ("special_features", "TEXT", "comma-separated extras such as Trailers or Deleted Scenes"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "film_actor",
        kind: TableKind::Table,
        purpose: "Links films to the actors who appear in them (many to many).",
        columns: &[
            ("actor_id", "INTEGER", "references actor.actor_id"),
            ("film_id", "INTEGER", "references film.film_id"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "film_category",
        kind: TableKind::Table,
        purpose: "Links films to their category.",
        columns: &[
            ("film_id", "INTEGER", "references film.film_id"),
            ("category_id", "INTEGER", "references category.category_id"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "inventory",
        kind: TableKind::Table,
        purpose: "Physical copies of films held by each store.",
        columns: &[
            ("inventory_id", "INTEGER", "primary key"),
            ("film_id", "INTEGER", "references film.film_id"),
            ("store_id", "INTEGER", "references store.store_id"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "language",
        kind: TableKind::Table,
        purpose: "Languages films are released in.",
        columns: &[
            ("language_id", "INTEGER", "primary key"),
            ("name", "CHAR(20)", "language name"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "payment",
        kind: TableKind::Table,
        purpose: "Payments made by customers for rentals.",
        columns: &[
            ("payment_id", "INTEGER", "primary key"),
            ("customer_id", "INTEGER", "references customer.customer_id"),
            ("staff_id", "INTEGER", "references staff.staff_id, who took the payment"),
            ("rental_id", "INTEGER", "references rental.rental_id, optional"),
            ("amount", "DECIMAL(5,2)", "amount paid"),
            ("payment_date", "DATETIME", "when the payment was made"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "rental",
        kind: TableKind::Table,
        purpose: "Each rental of an inventory item by a customer.",
        columns: &[
            ("rental_id", "INTEGER", "primary key"),
            ("rental_date", "DATETIME", "when the item was rented"),
            ("inventory_id", "INTEGER", "references inventory.inventory_id"),
            ("customer_id", "INTEGER", "references customer.customer_id"),
            ("return_date", "DATETIME", "when the item was returned, NULL if still out"),
            ("staff_id", "INTEGER", "references staff.staff_id, who processed the rental"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "staff",
        kind: TableKind::Table,
        purpose: "Store employees and their login details.",
        columns: &[
            ("staff_id", "INTEGER", "primary key"),
            ("first_name", "VARCHAR(45)", "employee's first name"),
            ("last_name", "VARCHAR(45)", "employee's last name"),
            ("address_id", "INTEGER", "references address.address_id"),
            ("picture", "BLOB", "photo, optional"),
            ("email", "VARCHAR(50)", "email address, optional"),
            ("store_id", "INTEGER", "references store.store_id, where the employee works"),
            ("active", "BOOLEAN", "whether the employee is active, defaults to true"),
            ("username", "VARCHAR(16)", "login name"),
            ("password", "VARCHAR(40)", "password hash, optional"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "store",
        kind: TableKind::Table,
        purpose: "Rental stores and their managers.",
        columns: &[
            ("store_id", "INTEGER", "primary key"),
            ("manager_staff_id", "INTEGER", "references staff.staff_id, the store manager"),
            ("address_id", "INTEGER", "references address.address_id"),
            ("last_update", "TIMESTAMP", "last modification time"),
        ],
    },
    Definition {
        name: "customer_list",
        kind: TableKind::View,
        purpose: "Customers with their full address in one row.",
        columns: &[
            ("ID", "INTEGER", "customer_id"),
            ("name", "VARCHAR", "first and last name"),
            ("address", "VARCHAR", "street address"),
            ("zip code", "VARCHAR", "postal code"),
            ("phone", "VARCHAR", "phone number"),
            ("city", "VARCHAR", "city name"),
            ("country", "VARCHAR", "country name"),
            ("notes", "VARCHAR", "'active' or empty"),
            ("SID", "INTEGER", "store_id"),
        ],
    },
    Definition {
        name: "film_list",
        kind: TableKind::View,
        purpose: "Films with category, price and a list of actor names.",
        columns: &[
            ("FID", "INTEGER", "film_id"),
            ("title", "VARCHAR", "film title"),
            ("description", "TEXT", "plot summary"),
            ("category", "VARCHAR", "category name"),
            ("price", "DECIMAL", "rental rate"),
            ("length", "INTEGER", "running time in minutes"),
            ("rating", "VARCHAR", "MPAA rating"),
            ("actors", "TEXT", "comma-separated actor names"),
        ],
    },
    Definition {
        name: "nicer_but_slower_film_list",
        kind: TableKind::View,
        purpose: "Same as film_list with actor names in title case; slower to query.",
        columns: &[
            ("FID", "INTEGER", "film_id"),
            ("title", "VARCHAR", "film title"),
            ("description", "TEXT", "plot summary"),
            ("category", "VARCHAR", "category name"),
            ("price", "DECIMAL", "rental rate"),
            ("length", "INTEGER", "running time in minutes"),
            ("rating", "VARCHAR", "MPAA rating"),
            ("actors", "TEXT", "comma-separated actor names, title case"),
        ],
    },
    Definition {
        name: "staff_list",
        kind: TableKind::View,
        purpose: "Staff members with their full address in one row.",
        columns: &[
            ("ID", "INTEGER", "staff_id"),
            ("name", "VARCHAR", "first and last name"),
            ("address", "VARCHAR", "street address"),
            ("zip code", "VARCHAR", "postal code"),
            ("phone", "VARCHAR", "phone number"),
            ("city", "VARCHAR", "city name"),
            ("country", "VARCHAR", "country name"),
            ("SID", "INTEGER", "store_id"),
        ],
    },
    Definition {
        name: "sales_by_store",
        kind: TableKind::View,
        purpose: "Total sales per store with location and manager.",
        columns: &[
            ("store", "VARCHAR", "city and country of the store"),
            ("manager", "VARCHAR", "manager's full name"),
            ("total_sales", "DECIMAL", "sum of payments taken at the store"),
        ],
    },
    Definition {
        name: "sales_by_film_category",
        kind: TableKind::View,
        purpose: "Total sales per film category.",
        columns: &[
            ("category", "VARCHAR", "category name"),
            ("total_sales", "DECIMAL", "sum of payments for films in the category"),
        ],
    },
    Definition {
        name: "actor_info",
        kind: TableKind::View,
        purpose: "Actors with the films they appear in, grouped by category.",
        columns: &[
            ("actor_id", "INTEGER", "actor id"),
            ("first_name", "VARCHAR", "actor's first name"),
            ("last_name", "VARCHAR", "actor's last name"),
            ("film_info", "TEXT", "'Category: title, title; Category: ...' listing"),
        ],
    },
];

impl Definition {
    fn render(&self) -> String {
        let mut text = format!("{}: {}\nPurpose: {}\nColumns:", self.kind.label(), self.name, self.purpose);
        for (name, ty, note) in self.columns {
            text.push_str(&format!("\n- {} ({}): {}", name, ty, note));
        }
        text
    }
}

/// All built-in schema entries, tables first.
///
/// # Returns
///
/// One entry per table/view; ids are `table_<name>` or `view_<name>`
pub fn builtin_schema() -> Vec<SchemaEntry> {
    DEFINITIONS
        .iter()
        .map(|def| SchemaEntry {
            id: format!("{}_{}", def.kind.as_str(), def.name),
            name: def.name.to_string(),
            kind: def.kind,
            text: def.render(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_unique() {
        let entries = builtin_schema();
        let ids: HashSet<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), entries.len());
        assert!(ids.contains("table_film"));
        assert!(ids.contains("view_sales_by_store"));
    }

    #[test]
    fn test_render_lists_columns() {
        let film = builtin_schema().into_iter().find(|e| e.name == "film").unwrap();
        assert!(film.text.starts_with("Table: film\nPurpose:"));
        assert!(film.text.contains("- rental_rate (DECIMAL(4,2)): price to rent"));
        assert!(film.text.contains("references language.language_id"));
    }
}
