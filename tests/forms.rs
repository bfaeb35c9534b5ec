use std::collections::HashMap;

use storefront::{
    dto::{categories::CategoryForm, products::ProductForm},
    forms::{like_pattern, parse_bool, parse_int, parse_money, slugify},
    uploads::{
        MultipartForm, UploadKind, UploadedFile, decode_images, discard_uploads, encode_images,
        extension_of, save_upload, save_uploads, stored_file_name,
    },
};

fn form(fields: &[(&str, &str)], files: Vec<(&str, UploadedFile)>) -> MultipartForm {
    MultipartForm {
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        files: files.into_iter().map(|(k, f)| (k.to_string(), f)).collect(),
    }
}

fn png(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.into(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

#[test]
fn slugify_collapses_separators() {
    assert_eq!(slugify("Zip Hoodie (Navy)"), "zip-hoodie-navy");
    assert_eq!(slugify("  --Hello,   World!--  "), "hello-world");
    assert_eq!(slugify("Café Crème"), "caf-cr-me");
    assert_eq!(slugify("!!!"), "");
}

#[test]
fn money_is_parsed_into_minor_units() {
    assert_eq!(parse_money("price", "19.99").unwrap(), 1999);
    assert_eq!(parse_money("price", "20").unwrap(), 2000);
    assert_eq!(parse_money("price", "0.5").unwrap(), 50);
    assert_eq!(parse_money("price", " 7. ").unwrap(), 700);

    for bad in ["", "-1", "1.999", "abc", "1,50", "."] {
        assert!(parse_money("price", bad).is_err(), "{bad} should be rejected");
    }
}

#[test]
fn ints_and_bools() {
    assert_eq!(parse_int::<i32>("inventory", " 12 ").unwrap(), 12);
    assert!(parse_int::<i32>("inventory", "twelve").is_err());

    for truthy in ["true", "1", "on", "YES"] {
        assert!(parse_bool(truthy));
    }
    for falsy in ["false", "0", "off", ""] {
        assert!(!parse_bool(falsy));
    }
}

#[test]
fn product_form_reads_fields_and_files() {
    let parsed = ProductForm::from_multipart(&form(
        &[
            ("name", " Zip Hoodie "),
            ("price", "59.00"),
            ("salePrice", ""),
            ("inventory", "15"),
            ("categoryId", "3"),
            ("isFeatured", "on"),
            ("existingImages", "[\"/uploads/products/a.jpg\"]"),
        ],
        vec![("images", png("b.png")), ("other", png("c.png"))],
    ))
    .unwrap();

    assert_eq!(parsed.name.as_deref(), Some("Zip Hoodie"));
    assert_eq!(parsed.price, Some(5900));
    assert_eq!(parsed.sale_price, Some(None));
    assert_eq!(parsed.inventory, Some(15));
    assert_eq!(parsed.category_id, Some(Some(3)));
    assert_eq!(parsed.is_featured, Some(true));
    assert_eq!(parsed.is_published, None);
    assert_eq!(
        parsed.existing_images,
        Some(vec!["/uploads/products/a.jpg".to_string()])
    );
    assert_eq!(parsed.new_images.len(), 1);
    assert_eq!(parsed.new_images[0].file_name, "b.png");
}

#[test]
fn product_form_rejects_bad_numbers() {
    assert!(ProductForm::from_multipart(&form(&[("price", "free")], vec![])).is_err());
    assert!(ProductForm::from_multipart(&form(&[("inventory", "-1")], vec![])).is_err());
    assert!(ProductForm::from_multipart(&form(&[("categoryId", "x")], vec![])).is_err());
}

#[test]
fn category_form_takes_first_image() {
    let parsed = CategoryForm::from_multipart(&form(
        &[("name", "Home"), ("description", " Desk things ")],
        vec![("image", png("one.png")), ("image", png("two.png"))],
    ));
    assert_eq!(parsed.name.as_deref(), Some("Home"));
    assert_eq!(parsed.slug, None);
    assert_eq!(parsed.description.as_deref(), Some("Desk things"));
    assert_eq!(parsed.image.map(|f| f.file_name).as_deref(), Some("one.png"));
}

#[test]
fn images_column_reads_json_and_legacy_lists() {
    assert_eq!(
        decode_images("[\"/a.jpg\",\"/b.jpg\"]"),
        vec!["/a.jpg", "/b.jpg"]
    );
    assert_eq!(decode_images("/a.jpg, /b.jpg ,"), vec!["/a.jpg", "/b.jpg"]);
    assert!(decode_images("").is_empty());
    assert!(decode_images("[]").is_empty());

    let stored = encode_images(&["/a.jpg".to_string()]);
    assert_eq!(stored, "[\"/a.jpg\"]");
    assert_eq!(decode_images(&stored), vec!["/a.jpg"]);
}

#[test]
fn upload_names_and_extensions() {
    assert_eq!(stored_file_name(1700, "abc", "png"), "1700-abc.png");
    assert_eq!(extension_of("Photo.JPG").unwrap(), "jpg");
    assert!(extension_of("script.sh").is_err());
    assert!(extension_of("README").is_err());
    assert!(extension_of("logo.svg").is_err());
    assert!(extension_of("LOGO.SVG").is_err());
}

#[test]
fn search_patterns_match_wildcards_literally() {
    assert_eq!(like_pattern("  mug "), "%mug%");
    assert_eq!(like_pattern("100%"), "%100\\%%");
    assert_eq!(like_pattern("a_b"), "%a\\_b%");
    assert_eq!(like_pattern("c:\\tmp"), "%c:\\\\tmp%");
}

#[tokio::test]
async fn uploads_are_written_under_their_kind() {
    let dir = tempfile::tempdir().unwrap();
    let public = save_upload(dir.path(), UploadKind::Categories, &png("Banner.PNG"))
        .await
        .unwrap();

    let file_name = public
        .strip_prefix("/uploads/categories/")
        .expect("public path under /uploads/categories");
    assert!(file_name.ends_with(".png"));
    let on_disk = dir.path().join("categories").join(file_name);
    assert_eq!(std::fs::read(on_disk).unwrap(), png("x.png").bytes);

    let empty = UploadedFile {
        file_name: "empty.png".into(),
        bytes: Vec::new(),
    };
    assert!(save_upload(dir.path(), UploadKind::Products, &empty).await.is_err());
}

#[tokio::test]
async fn discarded_uploads_leave_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let saved = save_uploads(dir.path(), UploadKind::Products, &[png("a.png"), png("b.webp")])
        .await
        .unwrap();
    assert_eq!(saved.len(), 2);

    discard_uploads(dir.path(), &saved).await;
    let left = std::fs::read_dir(dir.path().join("products")).unwrap().count();
    assert_eq!(left, 0);

    // Paths outside the upload tree are ignored.
    discard_uploads(dir.path(), &["/uploads/../escape.png".to_string(), "/etc/passwd".to_string()]).await;
}

#[tokio::test]
async fn one_bad_file_stores_none_of_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let batch = [png("ok.png"), png("vector.svg")];
    assert!(save_uploads(dir.path(), UploadKind::Products, &batch).await.is_err());
    assert!(!dir.path().join("products").exists());
}
